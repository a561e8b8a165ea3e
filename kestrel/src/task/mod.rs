mod ipc;
pub mod queue;
pub mod sched;
pub(crate) mod syscall;
pub mod table;

use ::syscall::CreateError;
pub use ::syscall::{TaskId, TaskInfo, TaskState};

use crate::config::{PRIORITY_IDLE, PRIORITY_MAX, PRIORITY_MIN};
pub use queue::{QueueLinks, Slot, TaskQueue};
pub use sched::PriorityScheduler;
pub use table::{Stack, TaskDescriptor, TaskTable};

/// Scheduling level. Lower is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u32);

impl Priority {
    pub const IDLE: Self = Self(PRIORITY_IDLE);

    /// Priorities a task may request: `PRIORITY_MAX..=PRIORITY_MIN`.
    #[inline]
    pub fn new(raw: usize) -> Result<Self, CreateError> {
        if (PRIORITY_MAX as usize..=PRIORITY_MIN as usize).contains(&raw) {
            Ok(Self(raw as u32))
        } else {
            Err(CreateError::InvalidPriority)
        }
    }

    #[inline]
    pub const fn level(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// A validated request for a new task.
#[derive(Debug, Clone, Copy)]
pub struct Spawn {
    pub(crate) entry: usize,
    pub(crate) priority: Priority,
    pub(crate) parent: Option<TaskId>,
}

impl Spawn {
    pub const fn new(entry: usize, priority: Priority) -> Self {
        Self {
            entry,
            priority,
            parent: None,
        }
    }

    /// Without a parent the task is its own parent.
    pub const fn parent(mut self, parent: TaskId) -> Self {
        self.parent = Some(parent);
        self
    }
}
