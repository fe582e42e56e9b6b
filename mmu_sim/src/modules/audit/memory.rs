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

use std::sync::{Arc, Mutex};

use super::AuditModule;
use crate::{error::AuditError, simulation::CycleStats};

/// Keeps all records in a vector that is shared with the creator.
///
/// Records arriving after [`AuditModule::close`] are rejected until the next
/// [`AuditModule::begin`].
pub struct MemoryAuditModule {
    records: Arc<Mutex<Vec<CycleStats>>>,
    open: bool,
}

impl MemoryAuditModule {
    pub fn new() -> (Self, Arc<Mutex<Vec<CycleStats>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                records: records.clone(),
                open: true,
            },
            records,
        )
    }
}

impl AuditModule for MemoryAuditModule {
    fn begin(&mut self) -> Result<(), AuditError> {
        self.open = true;
        Ok(())
    }

    fn record(&mut self, stats: &CycleStats) -> Result<(), AuditError> {
        if !self.open {
            return Err(AuditError::Closed);
        }

        // a poisoned vector still holds valid records
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(*stats);
        Ok(())
    }

    fn close(&mut self) -> Result<(), AuditError> {
        self.open = false;
        Ok(())
    }
}
