/*
 *  Copyright (C) 2025 Michael Bachmann
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::frame::{CLOCK_RATE, Ticks};
use libc::{CLOCK_TAI, clock_gettime, clockid_t, timespec};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    fn now(&self) -> Ticks;
}

fn system_time_for_clock_id(clock_id: clockid_t) -> timespec {
    let mut tp = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // -1 leaves tp zeroed.
    if unsafe { clock_gettime(clock_id, &mut tp) } == -1 {
        tracing::warn!("clock_gettime(CLOCK_TAI) failed, falling back to zeroed timespec");
    }
    tp
}

fn ticks_from_timespec(ts: timespec) -> Ticks {
    let nanos = ts.tv_sec as i128 * 1_000_000_000 + ts.tv_nsec as i128;
    (nanos * CLOCK_RATE as i128 / 1_000_000_000) as Ticks
}

pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Ticks {
        ticks_from_timespec(system_time_for_clock_id(CLOCK_TAI))
    }
}

#[derive(Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Ticks) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, ticks: Ticks) {
        self.now.store(ticks, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Ticks) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ticks {
        self.now.load(Ordering::SeqCst)
    }
}
