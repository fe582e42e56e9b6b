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

mod sim_core;

pub use self::sim_core::{CycleStats, SimulationCore, ARRIVAL_PROBABILITY, RECENT_ACCESS_CAPACITY};

use std::{
    collections::BTreeMap,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{error, info, trace, warn};

use crate::{
    error::MMUError,
    frame_store::Frame,
    mmu::MemoryAccess,
    modules::audit::AuditModule,
    process::{ProcessId, ProcessInfo},
    sim_config::SimConfig,
    tlb::{TlbEntry, TlbStats},
};

/// How long `reset` waits for the simulation thread to exit
const WORKER_EXIT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Idle,
    Running,
    Paused,
    Stopped,
}

type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

struct Control {
    state: SimulationState,

    /// incremented for every new worker and on reset, a worker whose
    /// generation is outdated exits at its next check
    generation: u64,

    /// workers that have been spawned and not exited yet
    active_workers: usize,

    /// the worker of the current generation has not left its loop, so a
    /// stopped simulation can continue on it
    attached: bool,
}

struct Shared<A: AuditModule> {
    control: Mutex<Control>,

    /// the worker is the only waiter, all control functions notify
    signal: Condvar,

    core: Mutex<SimulationCore<A>>,
    on_update: Mutex<Option<UpdateCallback>>,
}

/// A data structure holding a poisoned mutex is still consistent: every
/// step of the simulation runs to completion before a lock is released.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the simulation loop on a dedicated thread.
///
/// All mutation of frames, page tables and the translation cache happens on
/// that thread. Control functions may be called from any thread; queries
/// return snapshots.
///
/// ```text
/// Idle --start--> Running --pause--> Paused --start/resume--> Running
/// Running/Paused --stop--> Stopped --start--> Running
/// any --reset--> Idle
/// ```
pub struct SimulationDriver<A: AuditModule + 'static> {
    shared: Arc<Shared<A>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<A: AuditModule + 'static> SimulationDriver<A> {
    pub fn new(config: SimConfig, audit: A) -> Self {
        info!(
            "new simulation: {} frames, page size {}, TLB capacity {}, cycle {:?}",
            config.frame_count, config.page_size, config.tlb_capacity, config.cycle_duration
        );

        Self {
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    state: SimulationState::Idle,
                    generation: 0,
                    active_workers: 0,
                    attached: false,
                }),
                signal: Condvar::new(),
                core: Mutex::new(SimulationCore::new(config, audit)),
                on_update: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Starts the simulation thread, or resumes a paused simulation.
    ///
    /// Does nothing if the simulation is already running. A stopped
    /// simulation continues with its current processes and cycle counter.
    /// A new thread is only spawned once the previous one has exited, so
    /// no cycle ever runs twice.
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = lock(&self.worker);
        let mut control = lock(&self.shared.control);

        match control.state {
            SimulationState::Running => Ok(()),
            SimulationState::Paused => {
                control.state = SimulationState::Running;
                self.shared.signal.notify_all();
                info!("simulation resumed");
                Ok(())
            }
            SimulationState::Stopped if control.attached => {
                // the worker has not left its loop yet and simply goes on
                if let Err(err) = lock(&self.shared.core).audit_mut().begin() {
                    warn!("could not open audit module: {}", err);
                }

                control.state = SimulationState::Running;
                self.shared.signal.notify_all();
                info!("simulation restarted");
                Ok(())
            }
            SimulationState::Idle | SimulationState::Stopped => {
                let on_worker_thread = worker
                    .as_ref()
                    .map_or(false, |handle| handle.thread().id() == thread::current().id());

                if control.active_workers > 0 && !on_worker_thread {
                    let (guard, timeout) = self
                        .shared
                        .signal
                        .wait_timeout_while(control, WORKER_EXIT_TIMEOUT, |control| {
                            control.active_workers > 0
                        })
                        .unwrap_or_else(PoisonError::into_inner);
                    control = guard;

                    if timeout.timed_out() {
                        warn!("previous simulation thread did not exit in time");
                    }
                }

                control.generation += 1;
                let generation = control.generation;
                let shared = self.shared.clone();

                let handle = thread::Builder::new()
                    .name("mmu-simulation".into())
                    .spawn(move || run_worker(shared, generation))?;

                control.state = SimulationState::Running;
                control.active_workers += 1;
                control.attached = true;
                drop(control);

                // a previously stopped worker has finished or will exit on
                // its own, it can never run another cycle
                if let Some(old) = worker.replace(handle) {
                    if old.is_finished() {
                        let _ = old.join();
                    }
                }

                info!("simulation started");
                Ok(())
            }
        }
    }

    /// Pauses before the next cycle begins
    pub fn pause(&self) {
        let mut control = lock(&self.shared.control);
        if control.state == SimulationState::Running {
            control.state = SimulationState::Paused;
            self.shared.signal.notify_all();
            info!("simulation paused");
        }
    }

    pub fn resume(&self) {
        let mut control = lock(&self.shared.control);
        if control.state == SimulationState::Paused {
            control.state = SimulationState::Running;
            self.shared.signal.notify_all();
            info!("simulation resumed");
        }
    }

    /// Stops the simulation after its current cycle and closes the audit
    /// module. Does not wait for the thread to exit.
    pub fn stop(&self) {
        {
            let mut control = lock(&self.shared.control);
            match control.state {
                SimulationState::Running | SimulationState::Paused => {
                    control.state = SimulationState::Stopped;
                    self.shared.signal.notify_all();
                }
                SimulationState::Idle | SimulationState::Stopped => return,
            }
        }

        let mut core = lock(&self.shared.core);
        if let Err(err) = core.audit_mut().close() {
            warn!("could not close audit module: {}", err);
        }
        info!("simulation stopped at cycle {}", core.cycle());
    }

    /// Stops the simulation, waits for its thread and clears all state.
    ///
    /// Afterwards the driver behaves as if it was newly constructed.
    /// Must not be called from the update callback.
    pub fn reset(&self) {
        self.stop();

        let mut worker = lock(&self.worker);
        {
            let mut control = lock(&self.shared.control);
            control.generation += 1;
            control.attached = false;
            self.shared.signal.notify_all();
        }

        if let Some(handle) = worker.take() {
            self.join_worker(handle);
        }

        lock(&self.shared.core).reset();
        lock(&self.shared.control).state = SimulationState::Idle;
        info!("simulation reset");
    }

    fn join_worker(&self, handle: JoinHandle<()>) {
        if handle.thread().id() == thread::current().id() {
            error!("simulation thread cannot wait for itself, reset from the update callback?");
            return;
        }

        let control = lock(&self.shared.control);
        let (control, timeout) = self
            .shared
            .signal
            .wait_timeout_while(control, WORKER_EXIT_TIMEOUT, |control| {
                control.active_workers > 0
            })
            .unwrap_or_else(PoisonError::into_inner);
        drop(control);

        if timeout.timed_out() {
            // outdated generation, it cannot start another cycle
            warn!("simulation thread did not exit in time, detaching it");
        } else if handle.join().is_err() {
            error!("simulation thread panicked");
        }
    }

    /// Sets the function that is called after every completed cycle.
    ///
    /// It runs on the simulation thread without any internal lock held, so
    /// it may use the query functions as well as `pause` and `stop`.
    pub fn set_on_update<F: Fn() + Send + Sync + 'static>(&self, callback: F) {
        *lock(&self.shared.on_update) = Some(Arc::new(callback));
    }

    pub fn clear_on_update(&self) {
        *lock(&self.shared.on_update) = None;
    }

    pub fn state(&self) -> SimulationState {
        lock(&self.shared.control).state
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            SimulationState::Running | SimulationState::Paused
        )
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SimulationState::Paused
    }

    pub fn cycle(&self) -> u64 {
        lock(&self.shared.core).cycle()
    }

    pub fn config(&self) -> SimConfig {
        lock(&self.shared.core).config().clone()
    }

    pub fn stats(&self) -> CycleStats {
        lock(&self.shared.core).stats()
    }

    pub fn active_processes(&self) -> Vec<ProcessInfo> {
        lock(&self.shared.core).process_infos()
    }

    pub fn page_table(&self, pid: ProcessId) -> Option<BTreeMap<usize, usize>> {
        lock(&self.shared.core).page_table(pid)
    }

    pub fn frame(&self, index: usize) -> Result<Frame, MMUError> {
        lock(&self.shared.core).frame(index)
    }

    pub fn frames(&self) -> Vec<Frame> {
        lock(&self.shared.core).frames()
    }

    pub fn tlb_stats(&self) -> TlbStats {
        lock(&self.shared.core).tlb_stats()
    }

    pub fn tlb_entries(&self) -> Vec<TlbEntry> {
        lock(&self.shared.core).tlb_entries()
    }

    pub fn recent_accesses(&self) -> Vec<MemoryAccess> {
        lock(&self.shared.core).recent_accesses()
    }
}

impl<A: AuditModule + 'static> Drop for SimulationDriver<A> {
    fn drop(&mut self) {
        self.stop();

        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            self.join_worker(handle);
        }
    }
}

/// Unregisters a worker when it exits.
///
/// If the worker of the current generation unwinds, the simulation is
/// stopped and an unfinished cycle is counted, so its process ids are not
/// handed out again.
struct WorkerGuard<'a, A: AuditModule> {
    shared: &'a Shared<A>,
    generation: u64,

    /// between the start of a cycle body and the cycle counter advancing
    in_cycle: bool,
}

impl<A: AuditModule> Drop for WorkerGuard<'_, A> {
    fn drop(&mut self) {
        let mut control = lock(&self.shared.control);

        if control.generation == self.generation {
            control.attached = false;

            if thread::panicking() {
                error!("simulation thread panicked, stopping the simulation");
                control.state = SimulationState::Stopped;

                let mut core = lock(&self.shared.core);
                if self.in_cycle {
                    core.advance_cycle();
                }
                if let Err(err) = core.audit_mut().close() {
                    warn!("could not close audit module: {}", err);
                }
            }
        }

        control.active_workers -= 1;
        self.shared.signal.notify_all();
    }
}

fn run_worker<A: AuditModule>(shared: Arc<Shared<A>>, generation: u64) {
    let mut guard = WorkerGuard {
        shared: &shared,
        generation,
        in_cycle: false,
    };

    if let Err(err) = lock(&shared.core).audit_mut().begin() {
        warn!("could not open audit module: {}", err);
    }

    loop {
        {
            let control = lock(&shared.control);
            let mut control = shared
                .signal
                .wait_while(control, |control| {
                    control.generation == generation && control.state == SimulationState::Paused
                })
                .unwrap_or_else(PoisonError::into_inner);

            if control.generation != generation || control.state != SimulationState::Running {
                if control.generation == generation {
                    control.attached = false;
                }
                break;
            }
        }

        guard.in_cycle = true;
        let stats = lock(&shared.core).run_cycle();
        trace!("cycle done: {:?}", stats);

        let callback = lock(&shared.on_update).clone();
        if let Some(callback) = callback {
            callback();
        }

        let cycle_duration = {
            // a reset from the callback already cleared everything
            if lock(&shared.control).generation != generation {
                break;
            }

            let mut core = lock(&shared.core);
            core.advance_cycle();
            guard.in_cycle = false;
            core.config().cycle_duration
        };

        let control = lock(&shared.control);
        let _ = shared
            .signal
            .wait_timeout_while(control, cycle_duration, |control| {
                control.generation == generation && control.state == SimulationState::Running
            })
            .unwrap_or_else(PoisonError::into_inner);
    }
}
