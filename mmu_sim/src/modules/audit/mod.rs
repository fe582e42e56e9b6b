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

mod dummy;
mod memory;

pub use dummy::NoopAuditModule;
pub use memory::MemoryAuditModule;

use crate::{error::AuditError, simulation::CycleStats};

/// Receives per-cycle statistics of a simulation.
///
/// Errors returned from any of these functions are logged by the driver and
/// never stop a simulation.
pub trait AuditModule: Send {
    /// Called every time a simulation thread starts
    fn begin(&mut self) -> Result<(), AuditError> {
        Ok(())
    }

    /// Called once per completed cycle
    fn record(&mut self, stats: &CycleStats) -> Result<(), AuditError>;

    /// Called when the simulation stops, flushes and releases any resource
    fn close(&mut self) -> Result<(), AuditError> {
        Ok(())
    }
}

impl<T: AuditModule + ?Sized> AuditModule for Box<T> {
    fn begin(&mut self) -> Result<(), AuditError> {
        (**self).begin()
    }

    fn record(&mut self, stats: &CycleStats) -> Result<(), AuditError> {
        (**self).record(stats)
    }

    fn close(&mut self) -> Result<(), AuditError> {
        (**self).close()
    }
}
