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

use log::trace;

use crate::{
    error::MMUError,
    frame_store::FrameStore,
    process::{Process, ProcessId},
    tlb::TranslationCache,
};

/// Result of one address translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MemoryAccess {
    pub pid: ProcessId,

    /// the token index that was translated
    pub virtual_address: usize,
    pub virtual_page: usize,
    pub frame: usize,
    pub physical_address: usize,

    /// `true` if the translation cache answered
    pub tlb_hit: bool,
}

/// The memory management unit.
///
/// Owns the physical frames and the translation cache. Processes consume
/// memory one token at a time and `page_size` tokens fit into one frame.
#[derive(Debug)]
pub struct TranslationUnit {
    frames: FrameStore,
    tlb: TranslationCache,
    page_size: usize,
}

impl TranslationUnit {
    pub fn new(frames: FrameStore, tlb_capacity: usize, page_size: usize) -> Self {
        debug_assert!(page_size > 0, "page size has to be positive");

        Self {
            frames,
            tlb: TranslationCache::new(tlb_capacity),
            page_size,
        }
    }

    /// Makes room for the next token of `process`.
    ///
    /// A new frame is taken (first-fit) only when the current last page of
    /// the process is full or it has none yet. If no frame is free, this
    /// returns [`MMUError::OutOfMemory`] without changing anything.
    pub fn allocate_for_next_unit(&mut self, process: &mut Process) -> Result<(), MMUError> {
        let token_count = process.token_count();

        if token_count % self.page_size == 0 {
            let frame = self
                .frames
                .first_free()
                .ok_or(MMUError::OutOfMemory { pid: process.pid() })?;

            self.frames.assign(frame, process.pid())?;

            let virtual_page = token_count / self.page_size;
            process.page_table_mut().record(virtual_page, frame);

            trace!(
                "allocate: process {} page {} -> frame {}",
                process.pid(),
                virtual_page,
                frame
            );
        }

        process.add_token();
        Ok(())
    }

    /// Translates `token_index` of `process` to its frame index
    pub fn translate(&mut self, process: &Process, token_index: usize) -> Result<usize, MMUError> {
        self.access(process, token_index).map(|access| access.frame)
    }

    /// Translates `token_index` of `process` and reports how it was resolved.
    ///
    /// The translation cache is asked first; on a miss the page table is used
    /// and its answer is cached.
    pub fn access(
        &mut self,
        process: &Process,
        token_index: usize,
    ) -> Result<MemoryAccess, MMUError> {
        let pid = process.pid();
        let virtual_page = token_index / self.page_size;

        let (frame, tlb_hit) = match self.tlb.lookup(pid, virtual_page) {
            Some(frame) => (frame, true),
            None => {
                let frame = process
                    .page_table()
                    .resolve(virtual_page)
                    .ok_or(MMUError::MissingTranslation { pid, virtual_page })?;

                self.tlb.insert(pid, virtual_page, frame);
                (frame, false)
            }
        };

        trace!(
            "translate: process {} token {} (page {}) -> frame {} [{}]",
            pid,
            token_index,
            virtual_page,
            frame,
            if tlb_hit { "HIT" } else { "MISS" }
        );

        Ok(MemoryAccess {
            pid,
            virtual_address: token_index,
            virtual_page,
            frame,
            physical_address: frame * self.page_size + token_index % self.page_size,
            tlb_hit,
        })
    }

    /// Frees every frame of `process`, drops its cached translations and
    /// clears its page table.
    pub fn release(&mut self, process: &mut Process) {
        for (_, frame) in process.page_table().iter() {
            // page table entries always point into the store
            if let Err(err) = self.frames.release(frame) {
                debug_assert!(false, "page table of {} is corrupt: {}", process.pid(), err);
            }
        }

        self.tlb.invalidate_process(process.pid());
        process.page_table_mut().clear();
    }

    /// Frees all frames and resets the translation cache
    pub fn reset(&mut self) {
        self.frames.clear();
        self.tlb.reset();
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    pub fn tlb(&self) -> &TranslationCache {
        &self.tlb
    }

    pub fn tlb_hits(&self) -> u64 {
        self.tlb.hits()
    }

    pub fn tlb_misses(&self) -> u64 {
        self.tlb.misses()
    }
}
