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

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
    thread,
    time::Duration,
};

use super::{get_test_config, init_test_logger, wait_until};
use crate::{
    modules::audit::{MemoryAuditModule, NoopAuditModule},
    CycleStats, ProcessId, SimulationDriver, SimulationState,
};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Holds the first caller of [`Gate::pass`] until the gate is opened
struct Gate {
    entered: AtomicBool,
    open: Mutex<bool>,
    signal: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: AtomicBool::new(false),
            open: Mutex::new(false),
            signal: Condvar::new(),
        })
    }

    fn pass(&self) {
        if self.entered.swap(true, Ordering::SeqCst) {
            return;
        }

        let open = self.open.lock().unwrap();
        let _open = self.signal.wait_while(open, |open| !*open).unwrap();
    }

    fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.signal.notify_all();
    }
}

/// Driver whose first cycle blocks in the update callback
fn gated_driver(
    frame_count: usize,
) -> (
    SimulationDriver<MemoryAuditModule>,
    Arc<Mutex<Vec<CycleStats>>>,
    Arc<Gate>,
) {
    let (audit, records) = MemoryAuditModule::new();
    let driver = SimulationDriver::new(get_test_config(frame_count, 2, 4), audit);

    let gate = Gate::new();
    let callback_gate = gate.clone();
    driver.set_on_update(move || callback_gate.pass());

    (driver, records, gate)
}

fn assert_cycles_increasing(records: &[CycleStats]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].cycle < pair[1].cycle,
            "cycle {} recorded after cycle {}",
            pair[1].cycle,
            pair[0].cycle
        );
    }
}

fn assert_unique_pids(driver: &SimulationDriver<MemoryAuditModule>) {
    let mut pids: Vec<ProcessId> = driver
        .active_processes()
        .iter()
        .map(|process| process.pid)
        .collect();
    let count = pids.len();
    pids.sort();
    pids.dedup();
    assert_eq!(pids.len(), count);
}

fn counting_driver(
    frame_count: usize,
) -> (SimulationDriver<NoopAuditModule>, Arc<AtomicU64>) {
    let driver = SimulationDriver::new(get_test_config(frame_count, 2, 4), NoopAuditModule);
    let updates = Arc::new(AtomicU64::new(0));

    let counter = updates.clone();
    driver.set_on_update(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    (driver, updates)
}

#[test]
fn test_driver_runs_cycles() {
    init_test_logger();
    let (audit, records) = MemoryAuditModule::new();
    let driver = SimulationDriver::new(get_test_config(20, 2, 4), audit);

    let updates = Arc::new(AtomicU64::new(0));
    let counter = updates.clone();
    driver.set_on_update(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(driver.state(), SimulationState::Idle);
    driver.start().unwrap();
    assert_eq!(driver.state(), SimulationState::Running);

    wait_until(TIMEOUT, || updates.load(Ordering::SeqCst) >= 20);
    driver.stop();
    assert_eq!(driver.state(), SimulationState::Stopped);

    let records = records.lock().unwrap();
    assert!(records.len() >= 20);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.cycle, i as u64);
        assert!(record.occupied_frames <= 20);
    }
}

#[test]
fn test_driver_start_twice_is_noop() {
    let (driver, updates) = counting_driver(16);
    driver.start().unwrap();
    driver.start().unwrap();
    assert_eq!(driver.state(), SimulationState::Running);

    wait_until(TIMEOUT, || updates.load(Ordering::SeqCst) >= 5);
    driver.stop();
    thread::sleep(Duration::from_millis(20));

    // one worker only: one update per cycle
    assert_eq!(updates.load(Ordering::SeqCst), driver.cycle());
}

#[test]
fn test_driver_pause_resume() {
    init_test_logger();
    let (driver, updates) = counting_driver(16);
    driver.start().unwrap();
    wait_until(TIMEOUT, || updates.load(Ordering::SeqCst) >= 3);

    driver.pause();
    assert!(driver.is_paused());

    // let an in-flight cycle finish
    thread::sleep(Duration::from_millis(20));
    let paused_at = driver.cycle();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(driver.cycle(), paused_at);
    assert_eq!(updates.load(Ordering::SeqCst), paused_at);

    driver.resume();
    assert_eq!(driver.state(), SimulationState::Running);
    wait_until(TIMEOUT, || driver.cycle() >= paused_at + 3);

    // start on a paused driver resumes it as well
    driver.pause();
    driver.start().unwrap();
    assert_eq!(driver.state(), SimulationState::Running);
    driver.stop();
}

#[test]
fn test_driver_stop() {
    let (audit, records) = MemoryAuditModule::new();
    let driver = SimulationDriver::new(get_test_config(16, 2, 4), audit);
    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.cycle() >= 3);

    driver.stop();
    thread::sleep(Duration::from_millis(20));
    let stopped_at = driver.cycle();
    let recorded = records.lock().unwrap().len();
    thread::sleep(Duration::from_millis(30));

    assert_eq!(driver.state(), SimulationState::Stopped);
    assert_eq!(driver.cycle(), stopped_at);
    assert_eq!(records.lock().unwrap().len(), recorded);

    // stopping again does nothing
    driver.stop();
    assert_eq!(driver.state(), SimulationState::Stopped);
}

#[test]
fn test_driver_restart_after_stop_keeps_state() {
    let (driver, _) = counting_driver(16);
    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.cycle() >= 5);
    driver.stop();
    thread::sleep(Duration::from_millis(20));
    let stopped_at = driver.cycle();

    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.cycle() >= stopped_at + 5);
    driver.reset();
}

#[test]
fn test_driver_reset() {
    init_test_logger();
    let (driver, _) = counting_driver(12);
    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.stats().occupied_frames > 0 && driver.cycle() >= 10);

    driver.reset();
    assert_eq!(driver.state(), SimulationState::Idle);
    assert_eq!(driver.cycle(), 0);
    assert!(driver.active_processes().is_empty());
    assert!(driver.frames().iter().all(|frame| !frame.is_occupied()));
    assert!(driver.tlb_entries().is_empty());
    assert!(driver.recent_accesses().is_empty());

    let tlb = driver.tlb_stats();
    assert_eq!((tlb.hits, tlb.misses, tlb.len), (0, 0, 0));

    // a second reset changes nothing
    let stats = driver.stats();
    driver.reset();
    assert_eq!(driver.stats(), stats);
    assert_eq!(driver.state(), SimulationState::Idle);

    // and the driver can be used again
    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.cycle() >= 3);
    driver.reset();
    assert_eq!(driver.cycle(), 0);
}

#[test]
fn test_driver_reset_while_paused() {
    let (driver, _) = counting_driver(12);
    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.cycle() >= 2);
    driver.pause();

    driver.reset();
    assert_eq!(driver.state(), SimulationState::Idle);
    assert_eq!(driver.stats().active_processes, 0);
}

#[test]
fn test_driver_callback_may_query_and_pause() {
    let driver = Arc::new(SimulationDriver::new(
        get_test_config(32, 2, 4),
        NoopAuditModule,
    ));

    let weak = Arc::downgrade(&driver);
    driver.set_on_update(move || {
        if let Some(driver) = weak.upgrade() {
            // callback runs after the cycle body and before the counter moves
            let stats = driver.stats();
            assert_eq!(stats.active_processes, driver.active_processes().len());
            if stats.cycle >= 4 {
                driver.pause();
            }
        }
    });

    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.is_paused());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(driver.cycle(), 5);

    driver.clear_on_update();
    driver.reset();
}

#[test]
fn test_driver_queries() {
    let driver = SimulationDriver::new(get_test_config(24, 2, 4), NoopAuditModule);
    assert_eq!(driver.frames().len(), 24);
    assert!(driver.frame(23).is_ok());
    assert!(driver.frame(24).is_err());
    assert_eq!(driver.config().frame_count, 24);

    driver.start().unwrap();
    wait_until(TIMEOUT, || !driver.active_processes().is_empty());
    driver.pause();
    thread::sleep(Duration::from_millis(20));

    for process in driver.active_processes() {
        if let Some(table) = driver.page_table(process.pid) {
            assert_eq!(table.len(), process.pages_mapped);
            for frame in table.values() {
                assert_eq!(driver.frame(*frame).unwrap().owner(), Some(process.pid));
            }
        }
    }

    let tlb = driver.tlb_stats();
    assert!(tlb.len <= tlb.capacity);
    assert_eq!(driver.tlb_entries().len(), tlb.len);
    driver.reset();
}

#[test]
fn test_driver_restart_during_cycle() {
    init_test_logger();
    let (driver, records, gate) = gated_driver(64);
    driver.start().unwrap();
    wait_until(TIMEOUT, || gate.entered());

    // the worker is still inside cycle 0
    driver.stop();
    driver.start().unwrap();
    assert_eq!(driver.state(), SimulationState::Running);
    gate.open();

    wait_until(TIMEOUT, || driver.cycle() >= 30);
    assert_eq!(driver.state(), SimulationState::Running);
    driver.stop();

    let records = records.lock().unwrap();
    assert_eq!(records[0].cycle, 0);
    assert_cycles_increasing(&records);
    assert_unique_pids(&driver);
}

#[test]
fn test_driver_restart_while_worker_exits() {
    let (driver, records, gate) = gated_driver(64);
    driver.start().unwrap();
    wait_until(TIMEOUT, || gate.entered());

    // the worker leaves its loop at any point between these calls
    driver.stop();
    gate.open();
    driver.start().unwrap();

    wait_until(TIMEOUT, || driver.cycle() >= 30);
    assert_eq!(driver.state(), SimulationState::Running);
    driver.stop();

    assert_cycles_increasing(&records.lock().unwrap());
    assert_unique_pids(&driver);
}

#[test]
fn test_driver_reset_waits_for_cycle_in_progress() {
    let (driver, records, gate) = gated_driver(32);
    driver.start().unwrap();
    wait_until(TIMEOUT, || gate.entered());

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };

    // returns only after the held worker has exited
    driver.reset();
    opener.join().unwrap();

    assert_eq!(driver.state(), SimulationState::Idle);
    assert_eq!(driver.cycle(), 0);
    assert!(driver.active_processes().is_empty());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(driver.cycle(), 0);

    let before = records.lock().unwrap().len();
    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.cycle() >= 10);
    driver.stop();

    let records = records.lock().unwrap();
    assert_eq!(records[before].cycle, 0);
    assert_cycles_increasing(&records[before..]);
    assert_unique_pids(&driver);
}

#[test]
fn test_driver_panicking_callback_stops_simulation() {
    let (audit, records) = MemoryAuditModule::new();
    let driver = SimulationDriver::new(get_test_config(32, 2, 4), audit);

    let failed = Arc::new(AtomicBool::new(false));
    let callback_failed = failed.clone();
    driver.set_on_update(move || {
        if !callback_failed.swap(true, Ordering::SeqCst) {
            panic!("update callback failed");
        }
    });

    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.state() == SimulationState::Stopped);
    assert!(failed.load(Ordering::SeqCst));

    // the interrupted cycle still counts
    assert_eq!(driver.cycle(), 1);

    driver.start().unwrap();
    wait_until(TIMEOUT, || driver.cycle() >= 10);
    assert_eq!(driver.state(), SimulationState::Running);
    driver.stop();

    let records = records.lock().unwrap();
    assert_eq!(records[0].cycle, 0);
    assert_eq!(records[1].cycle, 1);
    assert_cycles_increasing(&records);
    assert_unique_pids(&driver);
}
