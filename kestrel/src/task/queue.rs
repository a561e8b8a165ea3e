use crate::config::MAX_TASKS;

/// Index of a descriptor in the task pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u16);

impl Slot {
    #[inline]
    pub const fn new(index: usize) -> Self {
        assert!(index < MAX_TASKS);
        Self(index as u16)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Queue links for every slot, shared by all queues. A slot is in at most one queue at a time.
pub struct QueueLinks {
    /// Towards the tail (older entries).
    next: [Option<Slot>; MAX_TASKS],
    /// Towards the head (newer entries).
    prev: [Option<Slot>; MAX_TASKS],
    queued: [bool; MAX_TASKS],
}

impl QueueLinks {
    pub const fn new() -> Self {
        Self {
            next: [None; MAX_TASKS],
            prev: [None; MAX_TASKS],
            queued: [false; MAX_TASKS],
        }
    }

    #[inline]
    pub fn is_queued(&self, slot: Slot) -> bool {
        self.queued[slot.index()]
    }
}

impl Default for QueueLinks {
    fn default() -> Self {
        Self::new()
    }
}

/// FIFO of slots linked through [`QueueLinks`]. Push adds at the head, pop removes at the tail.
#[derive(Debug, Default)]
pub struct TaskQueue {
    head: Option<Slot>,
    tail: Option<Slot>,
    len: usize,
}

impl TaskQueue {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        kassert!(self.head.is_none() == self.tail.is_none());
        self.head.is_none()
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    pub fn push(&mut self, links: &mut QueueLinks, slot: Slot) {
        let i = slot.index();
        kassert!(!links.queued[i], "slot {} is already queued", i);
        links.queued[i] = true;
        links.prev[i] = None;
        links.next[i] = self.head;
        match self.head {
            Some(head) => links.prev[head.index()] = Some(slot),
            None => {
                kassert!(self.tail.is_none());
                self.tail = Some(slot);
            }
        }
        self.head = Some(slot);
        self.len += 1;
    }

    pub fn pop(&mut self, links: &mut QueueLinks) -> Option<Slot> {
        let tail = self.tail?;
        let i = tail.index();
        kassert!(links.queued[i] && links.next[i].is_none());
        self.tail = links.prev[i];
        match self.tail {
            Some(t) => links.next[t.index()] = None,
            None => {
                kassert!(self.head == Some(tail));
                self.head = None;
            }
        }
        links.prev[i] = None;
        links.queued[i] = false;
        self.len -= 1;
        Some(tail)
    }

    /// The slot the next `pop` returns.
    #[inline]
    pub fn peek(&self) -> Option<Slot> {
        self.tail
    }
}
