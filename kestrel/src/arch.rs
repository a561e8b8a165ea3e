//! The boundary between the kernel and a board. Everything the kernel knows about hardware goes
//! through these traits.

use syscall::Channel;

/// Why a resumed task came back to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// `svc` with the syscall number the task passed.
    Syscall(usize),
    /// A hardware interrupt preempted the task.
    Interrupt,
}

/// A task's saved register file.
pub trait ArchContext: Sized + Default {
    /// A context whose first resume starts at `entry` on `stack_top`, and lands in `exit_trampoline`
    /// if `entry` returns.
    fn new(entry: usize, stack_top: usize, exit_trampoline: usize) -> Self;
    /// Syscall argument `index` (0 to 4).
    fn arg(&self, index: usize) -> usize;
    fn set_arg(&mut self, index: usize, value: usize);
    /// Value the pending syscall returns when the task next runs.
    fn set_return(&mut self, value: isize);
}

/// Logical interrupt sources, one bit each in [`InterruptController::pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    Timer = 0,
    Com1 = 1,
    Com2 = 2,
}

impl IrqSource {
    #[inline]
    pub const fn from_bit(bit: u32) -> Option<Self> {
        match bit {
            0 => Some(Self::Timer),
            1 => Some(Self::Com1),
            2 => Some(Self::Com2),
            _ => None,
        }
    }

    #[inline]
    pub const fn mask(self) -> u32 {
        1 << self as u32
    }
}

pub trait InterruptController {
    /// Acknowledge and report pending interrupts as a mask of [`IrqSource`] bits.
    fn pending(&mut self) -> u32;
    /// Signal end of interrupt for `source`.
    fn complete(&mut self, source: IrqSource);
}

pub trait Timer {
    fn clear_interrupt(&mut self);
    /// Free-running microsecond clock.
    fn micros(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialIrq {
    Rx,
    Tx,
}

pub trait Serial {
    fn can_read(&self, channel: Channel) -> bool;
    fn read(&mut self, channel: Channel) -> u8;
    fn can_write(&self, channel: Channel) -> bool;
    fn write(&mut self, channel: Channel, byte: u8);
    /// The interrupt condition the channel is currently raising, if any.
    fn pending_irq(&self, channel: Channel) -> Option<SerialIrq>;
    fn set_irq(&mut self, channel: Channel, kind: SerialIrq, enabled: bool);
}

pub trait Arch {
    type Context: ArchContext;
    type Interrupt: InterruptController;
    type Timer: Timer;
    type Serial: Serial;

    /// Run the task until it traps back into the kernel.
    fn resume(&mut self, context: &mut Self::Context) -> Trap;
    fn interrupt_controller(&mut self) -> &mut Self::Interrupt;
    fn timer(&mut self) -> &mut Self::Timer;
    fn serial(&mut self) -> &mut Self::Serial;
    /// Entry point of the idle task.
    fn idle_entry(&self) -> usize;
    fn exit_trampoline(&self) -> usize;
    /// Quiesce the devices the kernel enabled.
    fn shutdown(&mut self);
}
