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

use std::collections::BTreeMap;

/// One-level page table of a single process.
///
/// Maps a virtual page number to a frame index. Pages are recorded by the
/// translation unit and only ever removed all at once.
#[derive(Debug, Default, Clone)]
pub struct PageTable {
    mapping: BTreeMap<usize, usize>,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the mapping of `virtual_page`
    pub fn record(&mut self, virtual_page: usize, frame_index: usize) {
        self.mapping.insert(virtual_page, frame_index);
    }

    /// Returns the frame of `virtual_page`, `None` is a page fault
    pub fn resolve(&self, virtual_page: usize) -> Option<usize> {
        self.mapping.get(&virtual_page).copied()
    }

    pub fn clear(&mut self) {
        self.mapping.clear();
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Iterates over `(virtual_page, frame_index)` in page order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mapping.iter().map(|(page, frame)| (*page, *frame))
    }

    /// Copy of the whole mapping
    pub fn snapshot(&self) -> BTreeMap<usize, usize> {
        self.mapping.clone()
    }
}
