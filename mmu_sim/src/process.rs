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

use core::fmt;

use crate::page_table::PageTable;

/// Identifier of a simulated process.
///
/// Ids are handed out from the cycle counter and are never reused while a
/// driver is alive, translation cache invalidation depends on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A workload that consumes memory one token at a time.
#[derive(Debug)]
pub struct Process {
    pid: ProcessId,
    label: String,

    /// count of tokens consumed so far
    token_count: usize,

    page_table: PageTable,
}

impl Process {
    pub fn new(pid: ProcessId, label: String) -> Self {
        Self {
            pid,
            label,
            token_count: 0,
            page_table: PageTable::new(),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    pub(crate) fn page_table_mut(&mut self) -> &mut PageTable {
        &mut self.page_table
    }

    pub(crate) fn add_token(&mut self) {
        self.token_count += 1;
    }

    pub(crate) fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            label: self.label.clone(),
            token_count: self.token_count,
            pages_mapped: self.page_table.len(),
        }
    }
}

/// Point-in-time view of a [`Process`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub label: String,
    pub token_count: usize,
    pub pages_mapped: usize,
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tokens: {})", self.label, self.token_count)
    }
}
