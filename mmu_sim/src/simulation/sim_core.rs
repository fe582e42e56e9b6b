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

use std::collections::{BTreeMap, VecDeque};

use log::{debug, error, trace, warn};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::{
    frame_store::{Frame, FrameStore},
    mmu::{MemoryAccess, TranslationUnit},
    modules::audit::AuditModule,
    process::{Process, ProcessId, ProcessInfo},
    sim_config::SimConfig,
    tlb::{TlbEntry, TlbStats},
    MMUError,
};

/// Chance that a new process arrives in a cycle
pub const ARRIVAL_PROBABILITY: f64 = 0.3;

/// How many translations [`SimulationCore::recent_accesses`] keeps
pub const RECENT_ACCESS_CAPACITY: usize = 64;

/// Statistics reported to the audit module after every cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CycleStats {
    pub cycle: u64,
    pub active_processes: usize,
    pub occupied_frames: usize,
    pub tlb_hits: u64,
    pub tlb_misses: u64,
}

/// All state of one simulation.
///
/// The driver keeps this behind a mutex and only its worker thread runs
/// cycles, but the core is usable on its own for synchronous runs.
pub struct SimulationCore<A: AuditModule> {
    config: SimConfig,
    mmu: TranslationUnit,

    /// active processes in arrival order
    processes: Vec<Process>,

    cycle: u64,
    rng: Xoshiro256PlusPlus,
    recent_accesses: VecDeque<MemoryAccess>,
    audit: A,
}

impl<A: AuditModule> SimulationCore<A> {
    pub fn new(config: SimConfig, audit: A) -> Self {
        let frames = FrameStore::new(config.frame_count);
        let mmu = TranslationUnit::new(frames, config.tlb_capacity, config.page_size);
        let rng = Self::create_rng(&config);

        Self {
            config,
            mmu,
            processes: Vec::new(),
            cycle: 0,
            rng,
            recent_accesses: VecDeque::with_capacity(RECENT_ACCESS_CAPACITY),
            audit,
        }
    }

    fn create_rng(config: &SimConfig) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(config.seed.unwrap_or_else(rand::random))
    }

    /// Runs the body of one cycle: maybe admit a process, advance every
    /// process by one token and report to the audit module.
    ///
    /// Does not advance the cycle counter, see [`SimulationCore::advance_cycle`].
    pub fn run_cycle(&mut self) -> CycleStats {
        trace!("--- cycle {} ---", self.cycle);

        if self.rng.gen::<f64>() < ARRIVAL_PROBABILITY {
            self.admit_process();
        }

        self.step_processes();

        let stats = self.stats();
        if let Err(err) = self.audit.record(&stats) {
            warn!("could not audit cycle {}: {}", self.cycle, err);
        }

        stats
    }

    pub fn advance_cycle(&mut self) {
        self.cycle += 1;
    }

    /// Creates a new process whose id is the current cycle
    pub(crate) fn admit_process(&mut self) -> ProcessId {
        let pid = ProcessId(self.cycle);
        debug_assert!(
            self.processes.iter().all(|process| process.pid() != pid),
            "process id {} is already in use",
            pid
        );

        let process = Process::new(pid, format!("User-{}", pid));
        debug!("new process: {} arrived", process.label());
        self.processes.push(process);

        pid
    }

    /// Gives every active process one more token and translates it.
    ///
    /// A process that runs out of memory is released and removed, the
    /// others keep their order.
    pub(crate) fn step_processes(&mut self) {
        let mmu = &mut self.mmu;
        let recent_accesses = &mut self.recent_accesses;

        self.processes.retain_mut(|process| {
            if let Err(err) = mmu.allocate_for_next_unit(process) {
                debug!("process {} terminated: {}", process.label(), err);
                mmu.release(process);
                return false;
            }

            match mmu.access(process, process.token_count() - 1) {
                Ok(access) => {
                    if recent_accesses.len() == RECENT_ACCESS_CAPACITY {
                        recent_accesses.pop_front();
                    }
                    recent_accesses.push_back(access);
                }
                Err(err) => {
                    error!("translation after allocation failed: {}", err);
                    debug_assert!(false, "translation after allocation failed: {}", err);
                }
            }

            true
        });
    }

    /// Drops all processes, frees all memory and restarts at cycle 0
    pub fn reset(&mut self) {
        self.processes.clear();
        self.mmu.reset();
        self.recent_accesses.clear();
        self.cycle = 0;
        self.rng = Self::create_rng(&self.config);
    }

    pub fn stats(&self) -> CycleStats {
        CycleStats {
            cycle: self.cycle,
            active_processes: self.processes.len(),
            occupied_frames: self.mmu.frames().occupied_count(),
            tlb_hits: self.mmu.tlb_hits(),
            tlb_misses: self.mmu.tlb_misses(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn mmu(&self) -> &TranslationUnit {
        &self.mmu
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn process_infos(&self) -> Vec<ProcessInfo> {
        self.processes.iter().map(Process::info).collect()
    }

    pub fn page_table(&self, pid: ProcessId) -> Option<BTreeMap<usize, usize>> {
        self.processes
            .iter()
            .find(|process| process.pid() == pid)
            .map(|process| process.page_table().snapshot())
    }

    pub fn frame(&self, index: usize) -> Result<Frame, MMUError> {
        self.mmu.frames().get(index).copied()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.mmu.frames().iter().copied().collect()
    }

    pub fn tlb_stats(&self) -> TlbStats {
        self.mmu.tlb().stats()
    }

    pub fn tlb_entries(&self) -> Vec<TlbEntry> {
        self.mmu.tlb().entries()
    }

    /// Latest translations, oldest first
    pub fn recent_accesses(&self) -> Vec<MemoryAccess> {
        self.recent_accesses.iter().copied().collect()
    }

    pub(crate) fn audit_mut(&mut self) -> &mut A {
        &mut self.audit
    }
}
