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

use crate::clock::Clock;
use crate::error::{SchedulerError, SchedulerResult};
use crate::frame::Ticks;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

pub type TaskId = u64;
pub type Task = Box<dyn FnOnce(Ticks) + Send + 'static>;

pub trait Scheduler: Send + Sync {
    fn schedule_at(&self, task: Task, time: Ticks) -> SchedulerResult<TaskId>;
    fn cancel(&self, id: TaskId);
}

pub struct TokioScheduler {
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    handles: Mutex<HashMap<TaskId, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_id: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn delay_for(&self, time: Ticks) -> SchedulerResult<std::time::Duration> {
        let now = self.clock.now();
        if time < now {
            return Err(SchedulerError::TimeInPast {
                requested: time,
                now,
            });
        }
        let ticks = (time - now) as i128;
        let nanos = ticks * 1_000_000_000 / crate::frame::CLOCK_RATE as i128;
        Ok(std::time::Duration::from_nanos(nanos.max(0) as u64))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_at(&self, task: Task, time: Ticks) -> SchedulerResult<TaskId> {
        let delay = self.delay_for(time)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task(time);
        });
        self.handles.lock().expect("scheduler mutex poisoned").insert(id, handle);
        Ok(id)
    }

    fn cancel(&self, id: TaskId) {
        if let Some(handle) = self
            .handles
            .lock()
            .expect("scheduler mutex poisoned")
            .remove(&id)
        {
            handle.abort();
        } else {
            warn!(task_id = id, "cancel called for unknown or already-fired task id");
        }
    }
}

struct PendingTask {
    id: TaskId,
    time: Ticks,
    task: Task,
}

#[derive(Clone)]
pub struct ManualScheduler {
    next_id: Arc<AtomicU64>,
    pending: Arc<Mutex<Vec<PendingTask>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn run_due(&self, now: Ticks) {
        loop {
            let next = {
                let mut pending = self.pending.lock().expect("scheduler mutex poisoned");
                let idx = pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.time <= now)
                    .min_by_key(|(_, p)| p.time)
                    .map(|(i, _)| i);
                idx.map(|i| pending.remove(i))
            };
            match next {
                Some(p) => (p.task)(p.time),
                None => break,
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("scheduler mutex poisoned").len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_at(&self, task: Task, time: Ticks) -> SchedulerResult<TaskId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .expect("scheduler mutex poisoned")
            .push(PendingTask { id, time, task });
        Ok(id)
    }

    fn cancel(&self, id: TaskId) {
        let mut pending = self.pending.lock().expect("scheduler mutex poisoned");
        pending.retain(|p| p.id != id);
    }
}
