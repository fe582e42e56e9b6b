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

mod error;
mod frame_store;
mod mmu;
mod page_table;
mod process;
mod sim_config;
mod simulation;
mod tlb;

#[cfg(test)]
mod test;

pub mod modules;

pub use error::{AuditError, MMUError, ProfileError};
pub use frame_store::{Frame, FrameStore};
pub use mmu::{MemoryAccess, TranslationUnit};
pub use page_table::PageTable;
pub use process::{Process, ProcessId, ProcessInfo};
pub use sim_config::{load_profiles, parse_profiles, Profile, SimConfig};
pub use simulation::{
    CycleStats, SimulationCore, SimulationDriver, SimulationState, ARRIVAL_PROBABILITY,
    RECENT_ACCESS_CAPACITY,
};
pub use tlb::{TlbEntry, TlbKey, TlbStats, TranslationCache};
