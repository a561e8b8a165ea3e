use super::{Priority, QueueLinks, Slot, TaskQueue};
use crate::config::PRIORITY_COUNT;

/// One FIFO per priority level. Bit `i` of `ready` is set iff level `i` is non-empty.
pub struct PriorityScheduler {
    queues: [TaskQueue; PRIORITY_COUNT],
    ready: u32,
}

const _: () = assert!(PRIORITY_COUNT <= u32::BITS as usize);

impl PriorityScheduler {
    pub const fn new() -> Self {
        const EMPTY: TaskQueue = TaskQueue::new();
        Self {
            queues: [EMPTY; PRIORITY_COUNT],
            ready: 0,
        }
    }

    #[inline]
    pub fn schedule(&mut self, links: &mut QueueLinks, slot: Slot, priority: Priority) {
        let level = priority.level();
        self.queues[level].push(links, slot);
        self.ready |= 1 << level;
    }

    /// Pop the oldest task of the highest non-empty level.
    #[inline]
    pub fn next_scheduled(&mut self, links: &mut QueueLinks) -> Option<Slot> {
        if self.ready == 0 {
            return None;
        }
        let level = self.ready.trailing_zeros() as usize;
        let slot = self.queues[level].pop(links);
        kassert!(slot.is_some(), "ready bit set for empty level {}", level);
        if self.queues[level].is_empty() {
            self.ready &= !(1 << level);
        }
        slot
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(TaskQueue::len).sum()
    }
}

impl Default for PriorityScheduler {
    fn default() -> Self {
        Self::new()
    }
}
