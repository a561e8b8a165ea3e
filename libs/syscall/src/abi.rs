use core::fmt;

use bytemuck::{Pod, Zeroable};

/// Highest priority a user task can request.
pub const PRIORITY_MAX: u32 = 0;
/// Lowest priority a user task can request.
pub const PRIORITY_MIN: u32 = 30;
/// Reserved for the kernel's idle task.
pub const PRIORITY_IDLE: u32 = 31;
pub const PRIORITY_COUNT: usize = PRIORITY_IDLE as usize + 1;

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Pod, Zeroable)]
pub struct TaskId(pub u32);

impl TaskId {
    /// Largest representable task id.
    pub const MAX: u32 = i32::MAX as u32;

    /// Interpret a raw syscall argument. `None` if it can never name a task.
    #[inline]
    pub const fn from_raw(raw: isize) -> Option<Self> {
        if raw >= 0 && raw <= Self::MAX as isize {
            Some(Self(raw as u32))
        } else {
            None
        }
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready = 0,
    /// Sent a message, waiting for the receiver to pick it up.
    SendBlocked = 1,
    /// Waiting in `receive` for a sender.
    ReceiveBlocked = 2,
    /// Message delivered, waiting for the reply.
    ReplyBlocked = 3,
    Dead = 4,
}

impl TaskState {
    #[inline]
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Ready),
            1 => Some(Self::SendBlocked),
            2 => Some(Self::ReceiveBlocked),
            3 => Some(Self::ReplyBlocked),
            4 => Some(Self::Dead),
            _ => None,
        }
    }
}

/// Written by the `task-info` syscall.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TaskInfo {
    pub state: u32,
    pub priority: u32,
    pub parent: TaskId,
    _reserved: u32,
    pub user_time_micros: u64,
}

impl TaskInfo {
    #[inline]
    pub const fn new(state: TaskState, priority: u32, parent: TaskId, user_time_micros: u64) -> Self {
        Self {
            state: state as u32,
            priority,
            parent,
            _reserved: 0,
            user_time_micros,
        }
    }

    #[inline]
    pub const fn state(&self) -> Option<TaskState> {
        TaskState::from_u32(self.state)
    }
}

#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventId {
    TimerTick = 0,
    Com1Read = 1,
    Com1Write = 2,
    Com2Read = 3,
    Com2Write = 4,
}

impl EventId {
    pub const COUNT: usize = 5;
    pub const ALL: [EventId; Self::COUNT] = [
        Self::TimerTick,
        Self::Com1Read,
        Self::Com1Write,
        Self::Com2Read,
        Self::Com2Write,
    ];

    #[inline]
    pub const fn from_usize(v: usize) -> Option<Self> {
        if v < Self::COUNT {
            Some(Self::ALL[v])
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Serial ports. COM1 is the application port, COM2 the debug console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Com1 = 0,
    Com2 = 1,
}

impl Channel {
    pub const COUNT: usize = 2;

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn read_event(self) -> EventId {
        match self {
            Self::Com1 => EventId::Com1Read,
            Self::Com2 => EventId::Com2Read,
        }
    }

    #[inline]
    pub const fn write_event(self) -> EventId {
        match self {
            Self::Com1 => EventId::Com1Write,
            Self::Com2 => EventId::Com2Write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_range() {
        assert_eq!(TaskId::from_raw(0), Some(TaskId(0)));
        assert_eq!(TaskId::from_raw(i32::MAX as isize), Some(TaskId(TaskId::MAX)));
        assert_eq!(TaskId::from_raw(-1), None);
        assert_eq!(TaskId::from_raw(i32::MAX as isize + 1), None);
    }

    #[test]
    fn task_info_layout() {
        assert_eq!(core::mem::size_of::<TaskInfo>(), 24);
        let info = TaskInfo::new(TaskState::ReplyBlocked, 3, TaskId(7), 42);
        assert_eq!(info.state(), Some(TaskState::ReplyBlocked));
        let bytes = bytemuck::bytes_of(&info);
        assert_eq!(&bytes[8..12], &7u32.to_ne_bytes());
    }

    #[test]
    fn event_ids() {
        assert_eq!(EventId::from_usize(4), Some(EventId::Com2Write));
        assert_eq!(EventId::from_usize(5), None);
        assert_eq!(Channel::Com1.read_event(), EventId::Com1Read);
        assert_eq!(Channel::Com2.write_event().index(), 4);
    }
}
