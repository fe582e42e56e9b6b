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

mod csv_audit;

use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
};

use clap::Parser;
use csv_audit::CsvAuditModule;
use env_logger::{Builder, Env};
use log::{error, info, warn};
use mmu_sim::{load_profiles, SimConfig, SimulationDriver};

/// Runs the paged memory simulation without a user interface
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// file with `[name]` sections of `key = value` settings
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// profile to use, the first one of the file if omitted
    #[arg(long, requires = "profiles")]
    profile: Option<String>,

    /// number of cycles to simulate
    #[arg(long, default_value_t = 200)]
    cycles: u64,

    /// seed for process arrivals
    #[arg(long)]
    seed: Option<u64>,

    /// directory for the CSV audit files
    #[arg(long, default_value = "audit")]
    audit_dir: PathBuf,
}

fn select_config(args: &Args) -> Result<SimConfig, String> {
    let Some(path) = &args.profiles else {
        return Ok(SimConfig::default());
    };

    let profiles = load_profiles(path).map_err(|err| format!("{}: {}", path.display(), err))?;
    let profile = match &args.profile {
        Some(name) => profiles.into_iter().find(|profile| &profile.name == name),
        None => profiles.into_iter().next(),
    };

    profile
        .map(|profile| {
            info!(
                "using profile {} ({} x {} frames)",
                profile.name,
                profile.columns,
                profile.rows
            );
            profile.config
        })
        .ok_or_else(|| format!("no matching profile in {}", path.display()))
}

fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_module_path(false)
        .init();

    let args = Args::parse();

    let mut config = match select_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("could not load profile: {}", err);
            return ExitCode::FAILURE;
        }
    };
    config.seed = args.seed.or(config.seed);

    let driver = SimulationDriver::new(config, CsvAuditModule::new(&args.audit_dir));

    let completed = Arc::new((Mutex::new(false), Condvar::new()));
    let cycles = Arc::new(AtomicU64::new(0));
    {
        let completed = completed.clone();
        let target = args.cycles;
        driver.set_on_update(move || {
            if cycles.fetch_add(1, Ordering::SeqCst) + 1 >= target {
                let (done, signal) = &*completed;
                *done.lock().unwrap() = true;
                signal.notify_all();
            }
        });
    }

    if let Err(err) = driver.start() {
        error!("could not start simulation thread: {}", err);
        return ExitCode::FAILURE;
    }

    {
        let (done, signal) = &*completed;
        let guard = done.lock().unwrap();
        let _guard = signal.wait_while(guard, |done| !*done).unwrap();
    }
    driver.stop();

    let summary = serde_json::json!({
        "stats": driver.stats(),
        "tlb": driver.tlb_stats(),
        "processes": driver.active_processes(),
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(summary) => println!("{}", summary),
        Err(err) => warn!("could not serialize summary: {}", err),
    }

    ExitCode::SUCCESS
}
