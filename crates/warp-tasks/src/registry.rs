//! Task handle registry
//!
//! The registry is the single owner of handle state. Scripts and gameplay
//! code hold opaque `TaskHandle`s; the scheduler owns the tasks themselves and
//! publishes their status here after every update. A handle is released
//! exactly once, when its task is reaped.
//!
//! Slots live in a slab and handles carry the slot's generation, so storage
//! is bounded by the peak number of live tasks. A stale handle is told apart
//! from one that was never issued by comparing generations: a late kill
//! through a reaped handle is reported instead of ignored.

use crate::task::{Task, TaskOutcome};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use warp_core::WarpError;

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
/// Generations stay below 2^31 so handle bits always fit in an i64
const MAX_GENERATION: u32 = (1 << 31) - 1;

/// Opaque task identifier handed to gameplay code and script hosts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    fn new(index: u32, generation: u32) -> Self {
        TaskHandle((u64::from(generation) << INDEX_BITS) | u64::from(index))
    }

    fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    fn generation(self) -> u64 {
        self.0 >> INDEX_BITS
    }

    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from host data. Validity is checked by the registry.
    pub fn from_bits(bits: u64) -> Self {
        TaskHandle(bits)
    }
}

/// Protocol violations on the task handle bridge
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("unknown task handle {0}")]
    UnknownHandle(u64),

    #[error("task handle {0} was already reaped")]
    Reaped(u64),

    #[error("task handle {0} released twice")]
    DoubleRelease(u64),
}

impl From<BridgeError> for WarpError {
    fn from(err: BridgeError) -> Self {
        WarpError::Bridge(err.to_string())
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    priority: i32,
    outcome: TaskOutcome,
    kill_requested: bool,
}

#[derive(Debug)]
struct Entry {
    /// Generation of the current occupant, or of the next one when vacant
    generation: u32,
    slot: Option<Slot>,
    /// Final outcome of the previous generation, kept until the slot is reused
    last: Option<TaskOutcome>,
}

enum Lookup<'a> {
    Live(&'a Slot),
    Released(Option<&'a TaskOutcome>),
    Unknown,
}

/// Registry shared between the scheduler and script hosts
pub type SharedRegistry = Arc<Mutex<TaskRegistry>>;

/// Lock the registry, recovering the data if a holder panicked
pub fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, TaskRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct TaskRegistry {
    entries: Vec<Entry>,
    /// Vacant slots, oldest first
    free: VecDeque<usize>,
    pending: Vec<(TaskHandle, Box<dyn Task>)>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Register a task. It joins the scheduler at the start of the next pass.
    pub fn register(&mut self, task: Box<dyn Task>) -> TaskHandle {
        self.register_with(|_| task)
    }

    /// Construct and register a task that needs to know its own handle
    pub fn register_with<F>(&mut self, build: F) -> TaskHandle
    where
        F: FnOnce(TaskHandle) -> Box<dyn Task>,
    {
        let index = match self.free.pop_front() {
            Some(index) => index,
            None => {
                self.entries.push(Entry {
                    generation: 1,
                    slot: None,
                    last: None,
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[index];
        let handle = TaskHandle::new(index as u32, entry.generation);
        let task = build(handle);
        entry.last = None;
        entry.slot = Some(Slot {
            name: task.name().to_string(),
            priority: task.priority(),
            outcome: task.outcome(),
            kill_requested: false,
        });
        self.pending.push((handle, task));
        handle
    }

    fn lookup(&self, handle: TaskHandle) -> Lookup<'_> {
        let Some(entry) = self.entries.get(handle.index()) else {
            return Lookup::Unknown;
        };
        let generation = handle.generation();
        let current = u64::from(entry.generation);
        if generation == 0 || generation > current {
            return Lookup::Unknown;
        }
        match &entry.slot {
            Some(slot) if generation == current => Lookup::Live(slot),
            None if generation == current => Lookup::Unknown,
            _ => Lookup::Released(entry.last.as_ref().filter(|_| generation + 1 == current)),
        }
    }

    fn live_slot_mut(&mut self, handle: TaskHandle) -> Result<&mut Slot, BridgeError> {
        match self.lookup(handle) {
            Lookup::Live(_) => {}
            Lookup::Released(_) => return Err(BridgeError::Reaped(handle.0)),
            Lookup::Unknown => return Err(BridgeError::UnknownHandle(handle.0)),
        }
        self.entries
            .get_mut(handle.index())
            .and_then(|e| e.slot.as_mut())
            .ok_or(BridgeError::UnknownHandle(handle.0))
    }

    /// True once the task is terminal or a kill was requested.
    /// A reaped handle stays finished.
    pub fn is_finished(&self, handle: TaskHandle) -> Result<bool, BridgeError> {
        match self.lookup(handle) {
            Lookup::Live(slot) => Ok(slot.kill_requested || slot.outcome.is_terminal()),
            Lookup::Released(_) => Ok(true),
            Lookup::Unknown => Err(BridgeError::UnknownHandle(handle.0)),
        }
    }

    /// Ask for a task to be killed. Takes effect at the scheduler's next pass,
    /// but the handle reports finished immediately.
    pub fn request_kill(&mut self, handle: TaskHandle) -> Result<(), BridgeError> {
        let slot = self.live_slot_mut(handle)?;
        if !slot.outcome.is_terminal() {
            slot.kill_requested = true;
        }
        Ok(())
    }

    pub fn priority(&self, handle: TaskHandle) -> Result<i32, BridgeError> {
        match self.lookup(handle) {
            Lookup::Live(slot) => Ok(slot.priority),
            Lookup::Released(_) => Err(BridgeError::Reaped(handle.0)),
            Lookup::Unknown => Err(BridgeError::UnknownHandle(handle.0)),
        }
    }

    /// Last published outcome. Kill requests read as `Killed`. A reaped
    /// task's outcome stays readable until its slot is reused.
    pub fn outcome(&self, handle: TaskHandle) -> Result<TaskOutcome, BridgeError> {
        match self.lookup(handle) {
            Lookup::Live(slot) if slot.kill_requested && !slot.outcome.is_terminal() => {
                Ok(TaskOutcome::Killed)
            }
            Lookup::Live(slot) => Ok(slot.outcome.clone()),
            Lookup::Released(Some(outcome)) => Ok(outcome.clone()),
            Lookup::Released(None) => Err(BridgeError::Reaped(handle.0)),
            Lookup::Unknown => Err(BridgeError::UnknownHandle(handle.0)),
        }
    }

    pub fn name(&self, handle: TaskHandle) -> Result<&str, BridgeError> {
        match self.lookup(handle) {
            Lookup::Live(slot) => Ok(slot.name.as_str()),
            Lookup::Released(_) => Err(BridgeError::Reaped(handle.0)),
            Lookup::Unknown => Err(BridgeError::UnknownHandle(handle.0)),
        }
    }

    pub fn is_released(&self, handle: TaskHandle) -> bool {
        matches!(self.lookup(handle), Lookup::Released(_))
    }

    /// Handles that are registered and not yet released
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.slot.is_some()).count()
    }

    /// Slots allocated, live or vacant
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn take_pending(&mut self) -> Vec<(TaskHandle, Box<dyn Task>)> {
        std::mem::take(&mut self.pending)
    }

    /// Consume a pending kill request
    pub(crate) fn take_kill_request(&mut self, handle: TaskHandle) -> bool {
        match self.live_slot_mut(handle) {
            Ok(slot) => std::mem::take(&mut slot.kill_requested),
            Err(_) => false,
        }
    }

    pub(crate) fn publish(&mut self, handle: TaskHandle, priority: i32, outcome: TaskOutcome) {
        if let Ok(slot) = self.live_slot_mut(handle) {
            slot.priority = priority;
            slot.outcome = outcome;
        }
    }

    /// Release a handle. Called once per task, at reap time.
    pub fn release(&mut self, handle: TaskHandle) -> Result<(), BridgeError> {
        match self.lookup(handle) {
            Lookup::Live(_) => {}
            Lookup::Released(_) => return Err(BridgeError::DoubleRelease(handle.0)),
            Lookup::Unknown => return Err(BridgeError::UnknownHandle(handle.0)),
        }
        let index = handle.index();
        let Some(entry) = self.entries.get_mut(index) else {
            return Err(BridgeError::UnknownHandle(handle.0));
        };
        let Some(slot) = entry.slot.take() else {
            return Err(BridgeError::UnknownHandle(handle.0));
        };
        entry.last = Some(if slot.outcome.is_terminal() {
            slot.outcome
        } else {
            TaskOutcome::Killed
        });
        entry.generation += 1;
        // An exhausted slot is retired so its handles can never repeat
        if entry.generation <= MAX_GENERATION {
            self.free.push_back(index);
        }
        Ok(())
    }
}
