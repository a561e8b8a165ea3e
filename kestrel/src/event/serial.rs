use syscall::Channel;

use crate::{
    arch::{Arch, ArchContext, Serial, SerialIrq},
    task::Slot,
    Kernel,
};

/// One direction of a serial channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct Transfer {
    /// The interrupt fired with nobody waiting and is masked until the next await.
    pub pending: bool,
    /// Bytes moved for the current waiter.
    pub done: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SerialState {
    pub rx: Transfer,
    pub tx: Transfer,
}

impl SerialState {
    pub const fn new() -> Self {
        Self {
            rx: Transfer {
                pending: false,
                done: 0,
            },
            tx: Transfer {
                pending: false,
                done: 0,
            },
        }
    }

    #[inline]
    pub fn get(&self, kind: SerialIrq) -> &Transfer {
        match kind {
            SerialIrq::Rx => &self.rx,
            SerialIrq::Tx => &self.tx,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, kind: SerialIrq) -> &mut Transfer {
        match kind {
            SerialIrq::Rx => &mut self.rx,
            SerialIrq::Tx => &mut self.tx,
        }
    }
}

#[inline]
fn event_of(channel: Channel, kind: SerialIrq) -> syscall::EventId {
    match kind {
        SerialIrq::Rx => channel.read_event(),
        SerialIrq::Tx => channel.write_event(),
    }
}

impl<'s, A: Arch> Kernel<'s, A> {
    /// Serial await. Moves what the hardware allows now and parks only if bytes remain.
    pub(super) fn await_serial(&mut self, current: Slot, channel: Channel, kind: SerialIrq) {
        let transfer = self.events.serial[channel.index()].get_mut(kind);
        transfer.done = 0;
        if transfer.pending {
            trace!("{:?} {:?} was pending", channel, kind);
            transfer.pending = false;
        }
        if self.pump(current, channel, kind) {
            let done = self.events.serial[channel.index()].get(kind).done;
            return self.resume_with(current, done as isize);
        }
        self.events
            .park(&mut self.tasks.links, event_of(channel, kind), current);
        self.arch.serial().set_irq(channel, kind, true);
    }

    /// Move bytes between the hardware and `slot`'s buffer. The task's buffer and length arguments
    /// advance with the transfer. Returns true once the length reaches zero.
    fn pump(&mut self, slot: Slot, channel: Channel, kind: SerialIrq) -> bool {
        let context = &mut self.tasks.get_mut(slot).context;
        let serial = self.arch.serial();
        let transfer = self.events.serial[channel.index()].get_mut(kind);
        let (mut buf, mut left) = (context.arg(1), context.arg(2));
        while left > 0 {
            // The waiter is paused in the kernel; `buf` points into its memory.
            match kind {
                SerialIrq::Rx if serial.can_read(channel) => {
                    let byte = serial.read(channel);
                    unsafe { (buf as *mut u8).write(byte) };
                }
                SerialIrq::Tx if serial.can_write(channel) => {
                    let byte = unsafe { (buf as *const u8).read() };
                    serial.write(channel, byte);
                }
                _ => break,
            }
            buf += 1;
            left -= 1;
            transfer.done += 1;
        }
        context.set_arg(1, buf);
        context.set_arg(2, left);
        left == 0
    }

    pub(super) fn serial_interrupt(&mut self, channel: Channel) {
        let Some(kind) = self.arch.serial().pending_irq(channel) else {
            self.fatal(format_args!("{:?} interrupt without a cause", channel));
        };
        let event = event_of(channel, kind);
        match self.events.waiter(event) {
            Some(waiter) => {
                if self.pump(waiter, channel, kind) {
                    self.events.unpark(&mut self.tasks.links, event);
                    let done = core::mem::take(
                        &mut self.events.serial[channel.index()].get_mut(kind).done,
                    );
                    self.resume_with(waiter, done as isize);
                }
            }
            None => {
                self.arch.serial().set_irq(channel, kind, false);
                self.events.serial[channel.index()].get_mut(kind).pending = true;
            }
        }
    }
}
