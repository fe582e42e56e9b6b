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
    thread,
    time::{Duration, Instant},
};

use crate::SimConfig;

mod driver;

pub(crate) fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn get_test_config(frame_count: usize, page_size: usize, tlb_capacity: usize) -> SimConfig {
    SimConfig {
        page_size,
        tlb_capacity,
        frame_count,
        cycle_duration: Duration::from_millis(1),
        seed: Some(5446535461589659585),
    }
}

/// Polls `condition` until it holds, panics after `timeout`
pub(crate) fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) {
    let start = Instant::now();
    while !condition() {
        assert!(
            start.elapsed() < timeout,
            "condition not met within {:?}",
            timeout
        );
        thread::sleep(Duration::from_millis(1));
    }
}
