//! TaskScheduler - priority-ordered update pass with deferred insertion and reaping

use crate::registry::{lock_registry, BridgeError, SharedRegistry, TaskHandle, TaskRegistry};
use crate::task::{Task, TaskOutcome};
use warp_core::{Result, WarpError};
use warp_runtime::{RuntimeSystem, TimeContext};
use warp_world::NodeWorld;

struct ActiveTask {
    handle: TaskHandle,
    seq: u64,
    task: Box<dyn Task>,
}

/// Owns live tasks and updates them once per frame
///
/// A pass admits tasks registered since the last pass, stable-sorts by
/// `(priority, admission order)`, updates every unfinished task, then removes
/// finished ones. The active list is never mutated while tasks are updating.
pub struct TaskScheduler {
    registry: SharedRegistry,
    active: Vec<ActiveTask>,
    next_seq: u64,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::with_registry(TaskRegistry::shared())
    }

    pub fn with_registry(registry: SharedRegistry) -> Self {
        Self {
            registry,
            active: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn spawn(&mut self, task: impl Task + 'static) -> TaskHandle {
        self.spawn_boxed(Box::new(task))
    }

    pub fn spawn_boxed(&mut self, task: Box<dyn Task>) -> TaskHandle {
        lock_registry(&self.registry).register(task)
    }

    pub fn kill(&mut self, handle: TaskHandle) -> std::result::Result<(), BridgeError> {
        lock_registry(&self.registry).request_kill(handle)
    }

    pub fn is_finished(&self, handle: TaskHandle) -> std::result::Result<bool, BridgeError> {
        lock_registry(&self.registry).is_finished(handle)
    }

    pub fn status(&self, handle: TaskHandle) -> std::result::Result<TaskOutcome, BridgeError> {
        lock_registry(&self.registry).outcome(handle)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        lock_registry(&self.registry).pending_count()
    }

    /// Handles in the order the last pass updated them
    pub fn update_order(&self) -> Vec<TaskHandle> {
        self.active.iter().map(|t| t.handle).collect()
    }

    fn admit_pending(&mut self) {
        let pending = lock_registry(&self.registry).take_pending();
        for (handle, task) in pending {
            tracing::debug!(task = task.name(), handle = handle.to_bits(), "admitted");
            self.active.push(ActiveTask {
                handle,
                seq: self.next_seq,
                task,
            });
            self.next_seq += 1;
        }
    }

    /// One full update pass
    pub fn run_pass(&mut self, world: &mut NodeWorld, time: &TimeContext) -> Result<()> {
        self.admit_pending();

        // sort_by_key is stable; seq breaks ties explicitly as well
        self.active.sort_by_key(|t| (t.task.priority(), t.seq));

        for entry in &mut self.active {
            // The registry lock is never held across task calls
            let kill = lock_registry(&self.registry).take_kill_request(entry.handle);
            if kill {
                entry.task.kill();
            }
            if !entry.task.is_finished() {
                let step = time.step(entry.task.dependency());
                entry.task.update(&step, world);
            }
            let (priority, outcome) = (entry.task.priority(), entry.task.outcome());
            lock_registry(&self.registry).publish(entry.handle, priority, outcome);
        }

        self.reap()
    }

    /// Kill tasks whose kill was requested after their update in this pass.
    /// A killed task may request further kills, so repeat until none remain.
    fn drain_kill_requests(&mut self) {
        loop {
            let requested: Vec<usize> = {
                let mut registry = lock_registry(&self.registry);
                self.active
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| registry.take_kill_request(entry.handle))
                    .map(|(index, _)| index)
                    .collect()
            };
            if requested.is_empty() {
                break;
            }
            for index in requested {
                if let Some(entry) = self.active.get_mut(index) {
                    entry.task.kill();
                }
            }
        }
    }

    fn reap(&mut self) -> Result<()> {
        self.drain_kill_requests();
        let mut registry = lock_registry(&self.registry);
        let mut failures: Vec<BridgeError> = Vec::new();
        self.active.retain(|entry| {
            if !entry.task.is_finished() {
                return true;
            }
            match entry.task.outcome() {
                TaskOutcome::Failed(msg) => {
                    tracing::warn!(task = entry.task.name(), error = %msg, "task failed");
                }
                outcome => {
                    tracing::debug!(task = entry.task.name(), %outcome, "reaped");
                }
            }
            if let Err(err) = registry.release(entry.handle) {
                failures.push(err);
            }
            false
        });
        drop(registry);

        match failures.into_iter().next() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Kill and release every task, including ones not yet admitted
    pub fn kill_all(&mut self) -> Result<()> {
        self.admit_pending();
        for entry in &mut self.active {
            entry.task.kill();
        }
        let count = self.active.len();
        self.reap()?;
        // Anything registered while the sweep ran never gets admitted
        let stragglers = lock_registry(&self.registry).take_pending();
        for (handle, mut task) in stragglers {
            task.kill();
            lock_registry(&self.registry)
                .release(handle)
                .map_err(WarpError::from)?;
        }
        tracing::debug!(count, "killed all tasks");
        Ok(())
    }
}

impl RuntimeSystem for TaskScheduler {
    fn initialize(&mut self, _world: &mut NodeWorld) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, world: &mut NodeWorld, time: &TimeContext) -> Result<()> {
        self.run_pass(world, time)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.kill_all()
    }

    fn name(&self) -> &str {
        "tasks"
    }
}
