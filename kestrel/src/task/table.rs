use core::{marker::PhantomData, ptr::NonNull};

use syscall::CreateError;

use super::{Priority, QueueLinks, Slot, Spawn, TaskId, TaskQueue, TaskState};
use crate::{
    arch::ArchContext,
    config::{MAX_TASKS, STACK_CANARY, STACK_SIZE},
};

/// A task stack. One per slot, reserved up front.
#[repr(C, align(16))]
pub struct Stack([u8; STACK_SIZE]);

impl Stack {
    pub const ZERO: Self = Self([0; STACK_SIZE]);
}

pub struct TaskDescriptor<C> {
    /// Last id handed out from this slot. Kept after death until the slot is reused.
    pub id: Option<TaskId>,
    next_id: u32,
    pub parent: TaskId,
    pub priority: Priority,
    pub state: TaskState,
    pub context: C,
    /// Tasks blocked sending to this one, oldest first.
    pub senders: TaskQueue,
    pub user_time: u64,
}

impl<C: ArchContext> TaskDescriptor<C> {
    fn vacant(slot: usize) -> Self {
        Self {
            id: None,
            next_id: slot as u32,
            parent: TaskId(0),
            priority: Priority::IDLE,
            state: TaskState::Dead,
            context: C::default(),
            senders: TaskQueue::new(),
            user_time: 0,
        }
    }
}

/// The fixed task pool.
pub struct TaskTable<'s, C> {
    tasks: [TaskDescriptor<C>; MAX_TASKS],
    /// Tasks touch their stacks through raw addresses; the table holds only the base.
    stacks: NonNull<Stack>,
    _stacks: PhantomData<&'s mut [Stack]>,
    pub(crate) links: QueueLinks,
    free: TaskQueue,
}

impl<'s, C: ArchContext> TaskTable<'s, C> {
    pub fn new(stacks: &'s mut [Stack]) -> Self {
        kassert!(stacks.len() >= MAX_TASKS, "need {} stacks, got {}", MAX_TASKS, stacks.len());
        let mut links = QueueLinks::new();
        let mut free = TaskQueue::new();
        for i in 0..MAX_TASKS {
            free.push(&mut links, Slot::new(i));
        }
        Self {
            tasks: core::array::from_fn(TaskDescriptor::vacant),
            stacks: NonNull::from(stacks).cast(),
            _stacks: PhantomData,
            links,
            free,
        }
    }

    /// Allocate a slot and prime its context. The new task is READY but not scheduled.
    pub fn create(
        &mut self,
        spawn: Spawn,
        exit_trampoline: usize,
    ) -> Result<Slot, CreateError> {
        let slot = self
            .free
            .pop(&mut self.links)
            .ok_or(CreateError::InsufficientResources)?;
        if self.tasks[slot.index()].id.is_some() {
            self.check_canaries(slot);
        }
        self.write_canaries(slot);
        let stack_top = self.stack_top(slot);
        let task = &mut self.tasks[slot.index()];
        let id = TaskId(task.next_id);
        task.next_id = match id.0.checked_add(MAX_TASKS as u32) {
            Some(next) if next <= TaskId::MAX => next,
            _ => slot.index() as u32,
        };
        kassert!(task.senders.is_empty());
        task.id = Some(id);
        task.parent = spawn.parent.unwrap_or(id);
        task.priority = spawn.priority;
        task.state = TaskState::Ready;
        task.context = C::new(spawn.entry, stack_top, exit_trampoline);
        task.user_time = 0;
        debug!("create {} at {:?} priority {}", id, slot, spawn.priority.get());
        Ok(slot)
    }

    /// Mark the task DEAD and return its slot to the free list.
    pub fn kill(&mut self, slot: Slot) {
        self.check_canaries(slot);
        let task = &mut self.tasks[slot.index()];
        kassert!(task.state != TaskState::Dead);
        task.state = TaskState::Dead;
        self.free.push(&mut self.links, slot);
    }

    /// True iff `tid` names a live task.
    #[inline]
    pub fn tid_valid(&self, tid: TaskId) -> bool {
        self.lookup(tid).is_some()
    }

    /// The slot of a live task.
    #[inline]
    pub fn lookup(&self, tid: TaskId) -> Option<Slot> {
        self.occupant(tid)
            .filter(|slot| self.tasks[slot.index()].state != TaskState::Dead)
    }

    /// The slot whose last occupant had `tid`, alive or not.
    #[inline]
    pub fn occupant(&self, tid: TaskId) -> Option<Slot> {
        let slot = Slot::new(tid.as_usize() % MAX_TASKS);
        (self.tasks[slot.index()].id == Some(tid)).then_some(slot)
    }

    #[inline]
    pub fn id(&self, slot: Slot) -> TaskId {
        let id = self.tasks[slot.index()].id;
        kassert!(id.is_some(), "{:?} was never used", slot);
        id.unwrap_or_default()
    }

    #[inline]
    pub fn get(&self, slot: Slot) -> &TaskDescriptor<C> {
        &self.tasks[slot.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, slot: Slot) -> &mut TaskDescriptor<C> {
        &mut self.tasks[slot.index()]
    }

    /// Append `sender` to `receiver`'s pending senders.
    pub fn enqueue_sender(&mut self, receiver: Slot, sender: Slot) {
        self.tasks[receiver.index()]
            .senders
            .push(&mut self.links, sender);
    }

    pub fn dequeue_sender(&mut self, receiver: Slot) -> Option<Slot> {
        self.tasks[receiver.index()].senders.pop(&mut self.links)
    }

    /// Slots that have hosted a task, in slot order.
    pub fn used(&self) -> impl Iterator<Item = (Slot, &TaskDescriptor<C>)> + '_ {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id.is_some())
            .map(|(i, t)| (Slot::new(i), t))
    }

    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    fn stack_base(&self, slot: Slot) -> *mut u8 {
        unsafe { self.stacks.as_ptr().add(slot.index()).cast::<u8>() }
    }

    fn stack_top(&self, slot: Slot) -> usize {
        // The top canary occupies the highest 8 bytes; keep the initial sp 16-byte aligned.
        self.stack_base(slot) as usize + STACK_SIZE - 16
    }

    fn canaries(&self, slot: Slot) -> [*mut u64; 2] {
        let base = self.stack_base(slot);
        unsafe { [base.cast(), base.add(STACK_SIZE - 8).cast()] }
    }

    fn write_canaries(&mut self, slot: Slot) {
        for canary in self.canaries(slot) {
            unsafe { canary.write_volatile(STACK_CANARY) };
        }
    }

    fn check_canaries(&self, slot: Slot) {
        for canary in self.canaries(slot) {
            let value = unsafe { canary.read_volatile() };
            kassert!(
                value == STACK_CANARY,
                "stack canary of {:?} overwritten: {:#x}",
                slot,
                value
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn smash_stack(&mut self, slot: Slot) {
        unsafe { self.stack_base(slot).write_volatile(0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stacks, MockContext};

    fn spawn(p: usize) -> Spawn {
        Spawn::new(0x1000, Priority::new(p).unwrap())
    }

    #[test]
    fn create_primes_context_without_scheduling() {
        let mut stacks = stacks();
        let mut table = TaskTable::<MockContext>::new(&mut stacks);
        let slot = table.create(spawn(4), 0xdead).unwrap();
        let task = table.get(slot);
        assert_eq!(task.state, TaskState::Ready);
        assert_eq!(task.parent, task.id.unwrap());
        assert_eq!(task.context.entry, 0x1000);
        assert_eq!(task.context.exit_trampoline, 0xdead);
        assert_eq!(task.context.stack_top % 16, 0);
        assert!(!table.links.is_queued(slot));
    }

    #[test]
    fn tids_embed_slot_and_generation() {
        let mut stacks = stacks();
        let mut table = TaskTable::<MockContext>::new(&mut stacks);
        let a = table.create(spawn(1), 0).unwrap();
        let first = table.id(a);
        assert_eq!(first.as_usize() % MAX_TASKS, a.index());
        table.kill(a);
        assert!(!table.tid_valid(first));
        // Every other slot is reused before `a` comes back round.
        let mut reused = None;
        for _ in 0..MAX_TASKS {
            let s = table.create(spawn(1), 0).unwrap();
            if s == a {
                reused = Some(s);
                break;
            }
        }
        let reused = reused.unwrap();
        let second = table.id(reused);
        assert_eq!(second.0, first.0 + MAX_TASKS as u32);
        assert!(table.tid_valid(second));
        assert!(!table.tid_valid(first));
        assert_eq!(table.occupant(first), None);
    }

    #[test]
    fn pool_exhaustion() {
        let mut stacks = stacks();
        let mut table = TaskTable::<MockContext>::new(&mut stacks);
        for _ in 0..MAX_TASKS {
            table.create(spawn(2), 0).unwrap();
        }
        assert_eq!(table.free_slots(), 0);
        assert_eq!(
            table.create(spawn(2), 0).err(),
            Some(CreateError::InsufficientResources)
        );
    }

    #[test]
    fn ids_wrap_within_range() {
        let mut stacks = stacks();
        let mut table = TaskTable::<MockContext>::new(&mut stacks);
        let slot = Slot::new(MAX_TASKS - 1);
        // The largest id that still maps to this slot.
        table.tasks[slot.index()].next_id = TaskId::MAX;
        for _ in 0..MAX_TASKS {
            let s = table.create(spawn(2), 0).unwrap();
            table.kill(s);
            if s == slot {
                break;
            }
        }
        assert_eq!(table.tasks[slot.index()].next_id, slot.index() as u32);
    }

    #[test]
    #[should_panic]
    fn smashed_canary_is_fatal_on_exit() {
        let mut stacks = stacks();
        let mut table = TaskTable::<MockContext>::new(&mut stacks);
        let slot = table.create(spawn(2), 0).unwrap();
        table.smash_stack(slot);
        table.kill(slot);
    }

    #[test]
    #[should_panic(expected = "kernel assertion failed")]
    fn smashed_canary_is_fatal_on_reuse() {
        let mut stacks = stacks();
        let mut table = TaskTable::<MockContext>::new(&mut stacks);
        let slot = table.create(spawn(2), 0).unwrap();
        table.kill(slot);
        // The stack is overrun after the check at exit.
        table.smash_stack(slot);
        // The dead slot is last in the free list.
        for _ in 0..MAX_TASKS {
            let s = table.create(spawn(2), 0).unwrap();
            assert_ne!(s, slot, "slot was reused without a canary check");
        }
    }
}
