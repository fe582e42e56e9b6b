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

use thiserror::Error;

use crate::process::ProcessId;

/// Failures of the translation unit and the frame store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MMUError {
    /// No free frame is left for the requesting process.
    ///
    /// Nothing was mutated; the caller decides what to do with the process.
    #[error("out of memory: no free frame left for process {pid}")]
    OutOfMemory { pid: ProcessId },

    /// A frame index outside of `[0, frame_count)` was used.
    #[error("invalid frame index {index} (frame count is {frame_count})")]
    InvalidFrame { index: usize, frame_count: usize },

    /// The page table has no entry for a page that should have been allocated.
    #[error("missing translation for process {pid}, virtual page {virtual_page}")]
    MissingTranslation {
        pid: ProcessId,
        virtual_page: usize,
    },
}

/// Failures of an audit module. These never stop a simulation.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit sink is closed")]
    Closed,
}

/// Failures while reading configuration profiles.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("could not read profiles: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}
