// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! One-shot deadline timer backed by a single worker thread.
//!
//! Tasks are kept in a shared table keyed by [`TimerId`]; the worker only
//! learns deadlines over a channel. Cancelling removes the task from the
//! table, so once [`DeadlineTimer::cancel`] returns `true` the task can never
//! run. A `false` return means the task already ran (or is running).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::core::error::{PresentError, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

enum TimerCommand {
    Schedule { id: TimerId, deadline: Instant },
    Shutdown,
}

pub struct DeadlineTimer {
    name: String,
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<TimerId, Task>>>,
    commands: Sender<TimerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl DeadlineTimer {
    /// Spawn the worker thread.
    pub fn new(name: &str) -> Result<Self> {
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let tasks: Arc<Mutex<HashMap<TimerId, Task>>> = Arc::new(Mutex::new(HashMap::new()));

        let worker_tasks = Arc::clone(&tasks);
        let worker_name = name.to_string();
        let worker = std::thread::Builder::new()
            .name(format!("{}-timer", name))
            .spawn(move || run_timer_loop(&worker_name, command_rx, worker_tasks))
            .map_err(|e| PresentError::Timer(format!("failed to spawn {} timer: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            next_id: AtomicU64::new(1),
            tasks,
            commands,
            worker: Some(worker),
        })
    }

    /// Run `task` on the timer thread once `deadline` passes.
    pub fn schedule_at<F>(&self, deadline: Instant, task: F) -> Result<TimerId>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tasks.lock().insert(id, Box::new(task));

        if self
            .commands
            .send(TimerCommand::Schedule { id, deadline })
            .is_err()
        {
            self.tasks.lock().remove(&id);
            return Err(PresentError::Timer(format!(
                "{} timer thread is gone",
                self.name
            )));
        }
        Ok(id)
    }

    /// Run `task` on the timer thread after `delay`.
    pub fn schedule_after<F>(&self, delay: Duration, task: F) -> Result<TimerId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, task)
    }

    /// Cancel a task. Returns `true` if the task had not yet started.
    pub fn cancel(&self, id: TimerId) -> bool {
        self.tasks.lock().remove(&id).is_some()
    }

    /// Number of tasks still waiting to fire.
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl std::fmt::Debug for DeadlineTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlineTimer")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        let _ = self.commands.send(TimerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            // A task dropping the last handle from the timer thread itself
            // must not join its own thread.
            if worker.thread().id() != std::thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

fn run_timer_loop(
    name: &str,
    command_rx: Receiver<TimerCommand>,
    tasks: Arc<Mutex<HashMap<TimerId, Task>>>,
) {
    tracing::trace!("[{}] Timer thread started", name);
    let mut deadlines: BinaryHeap<Reverse<(Instant, TimerId)>> = BinaryHeap::new();

    loop {
        let command = match deadlines.peek() {
            Some(Reverse((deadline, _))) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match command_rx.recv_timeout(timeout) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match command_rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(TimerCommand::Schedule { id, deadline }) => {
                deadlines.push(Reverse((deadline, id)));
            }
            Some(TimerCommand::Shutdown) => break,
            None => {}
        }

        let now = Instant::now();
        while let Some(Reverse((deadline, id))) = deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            deadlines.pop();
            // Cancelled tasks are already gone from the table.
            let task = tasks.lock().remove(&id);
            if let Some(task) = task {
                task();
            }
        }
    }

    tracing::trace!("[{}] Timer thread exiting", name);
}
