/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use mmu_sim::{modules::audit::AuditModule, AuditError, CycleStats};

const HEADER: &str = "Cycle,Active_Processes,Occupied_Frames,TLB_Hits,TLB_Misses";

/// Writes one CSV row per cycle into `<dir>/data.csv`, or `data(N).csv` if
/// that name is taken. Every run gets a new file.
pub struct CsvAuditModule {
    dir: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl CsvAuditModule {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            writer: None,
        }
    }

    fn next_file_name(dir: &Path) -> PathBuf {
        let path = dir.join("data.csv");
        if !path.exists() {
            return path;
        }

        let mut i = 1;
        loop {
            let path = dir.join(format!("data({}).csv", i));
            if !path.exists() {
                return path;
            }
            i += 1;
        }
    }
}

impl AuditModule for CsvAuditModule {
    fn begin(&mut self) -> Result<(), AuditError> {
        self.close()?;
        fs::create_dir_all(&self.dir)?;

        let path = Self::next_file_name(&self.dir);
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", HEADER)?;
        writer.flush()?;

        log::info!("auditing into {}", path.display());
        self.writer = Some(writer);
        Ok(())
    }

    fn record(&mut self, stats: &CycleStats) -> Result<(), AuditError> {
        let writer = self.writer.as_mut().ok_or(AuditError::Closed)?;
        writeln!(
            writer,
            "{},{},{},{},{}",
            stats.cycle, stats.active_processes, stats.occupied_frames, stats.tlb_hits, stats.tlb_misses
        )?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AuditError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
