//! Interrupt-driven events. Tasks park on an event with `await` and are woken from the interrupt
//! path.

mod serial;

use syscall::{AwaitError, Channel, EventId};

use crate::{
    arch::{Arch, InterruptController, IrqSource, SerialIrq, Timer},
    config::TICK_MASK,
    task::{QueueLinks, Slot, TaskQueue},
    Kernel,
};
pub use serial::SerialState;

pub struct EventTable {
    waiters: [TaskQueue; EventId::COUNT],
    /// Tasks parked on any event.
    waiting: usize,
    ticks: usize,
    serial: [SerialState; Channel::COUNT],
}

impl EventTable {
    pub const fn new() -> Self {
        const EMPTY: TaskQueue = TaskQueue::new();
        Self {
            waiters: [EMPTY; EventId::COUNT],
            waiting: 0,
            ticks: 0,
            serial: [SerialState::new(), SerialState::new()],
        }
    }

    #[inline]
    pub const fn waiting(&self) -> usize {
        self.waiting
    }

    #[inline]
    pub const fn ticks(&self) -> usize {
        self.ticks
    }

    #[inline]
    pub fn waiter(&self, event: EventId) -> Option<Slot> {
        self.waiters[event.index()].peek()
    }

    fn park(&mut self, links: &mut QueueLinks, event: EventId, slot: Slot) {
        self.waiters[event.index()].push(links, slot);
        self.waiting += 1;
    }

    fn unpark(&mut self, links: &mut QueueLinks, event: EventId) -> Option<Slot> {
        let slot = self.waiters[event.index()].pop(links)?;
        self.waiting -= 1;
        Some(slot)
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl<'s, A: Arch> Kernel<'s, A> {
    /// `await(event, buf, buflen)`
    pub(crate) fn sys_await(&mut self, current: Slot) {
        let Some(event) = EventId::from_usize(self.arg(current, 0)) else {
            return self.resume_with(current, AwaitError::UnknownEvent.into());
        };
        if self.events.waiter(event).is_some() {
            return self.resume_with(current, AwaitError::MultipleWaiters.into());
        }
        match event {
            EventId::TimerTick => self.events.park(&mut self.tasks.links, event, current),
            EventId::Com1Read => self.await_serial(current, Channel::Com1, SerialIrq::Rx),
            EventId::Com1Write => self.await_serial(current, Channel::Com1, SerialIrq::Tx),
            EventId::Com2Read => self.await_serial(current, Channel::Com2, SerialIrq::Rx),
            EventId::Com2Write => self.await_serial(current, Channel::Com2, SerialIrq::Tx),
        }
    }

    /// Wake every task waiting on `event` with `data` as its return value.
    pub(crate) fn event_occurred(&mut self, event: EventId, data: usize) {
        while let Some(slot) = self.events.unpark(&mut self.tasks.links, event) {
            trace!("{:?} wakes {}", event, self.tasks.id(slot));
            self.resume_with(slot, data as isize);
        }
    }

    /// The interrupt trap. Services the lowest pending source, then requeues the interrupted task.
    pub(crate) fn handle_interrupt(&mut self, current: Slot) {
        let pending = self.arch.interrupt_controller().pending();
        if pending == 0 {
            warn!("spurious interrupt");
        } else {
            let bit = pending.trailing_zeros();
            let Some(source) = IrqSource::from_bit(bit) else {
                self.fatal(format_args!("unknown interrupt source {}", bit));
            };
            match source {
                IrqSource::Timer => {
                    self.arch.timer().clear_interrupt();
                    self.events.ticks = (self.events.ticks + 1) & TICK_MASK;
                    self.event_occurred(EventId::TimerTick, self.events.ticks);
                }
                IrqSource::Com1 => self.serial_interrupt(Channel::Com1),
                IrqSource::Com2 => self.serial_interrupt(Channel::Com2),
            }
            self.arch.interrupt_controller().complete(source);
        }
        self.schedule(current);
    }
}
