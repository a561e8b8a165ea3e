//! A scripted board for host tests. Each task entry address maps to a list of syscalls; the mock
//! records every value a task observes when it is resumed.

use std::collections::{HashMap, VecDeque};

pub(crate) use syscall::{Channel, EventId, Syscall, TaskId, TaskInfo, TaskInfoError};

pub(crate) use crate::arch::{IrqSource, SerialIrq};
pub(crate) use crate::config::MAX_TASKS;
use crate::{
    arch::{Arch, ArchContext, InterruptController, Serial, Timer, Trap},
    task::{Priority, Spawn, Stack},
    Kernel,
};

pub(crate) const IDLE: usize = 0x1d1e;
pub(crate) const EXIT_TRAMPOLINE: usize = 0xe817;
pub(crate) const INIT: usize = 0x1000;
pub(crate) const CHILD: usize = 0x2000;
pub(crate) const SIBLING: usize = 0x3000;
pub(crate) const SIBLING2: usize = 0x4000;

// Slots are handed out in order: idle, then init, then children.
pub(crate) const IDLE_TID: usize = 0;
pub(crate) const INIT_TID: usize = 1;
pub(crate) const FIRST_CHILD_TID: usize = 2;

const RUNAWAY: usize = 100_000;
/// Simulated time per resume.
const SLICE_MICROS: u64 = 10;

pub(crate) fn addr<T: ?Sized>(value: &mut T) -> usize {
    value as *mut T as *mut u8 as usize
}

pub(crate) fn stacks() -> Box<[Stack]> {
    (0..MAX_TASKS).map(|_| Stack::ZERO).collect()
}

#[derive(Debug, Clone, Copy)]
struct Step {
    syscall: usize,
    args: [usize; 5],
}

/// What a task does, one syscall per resume. Running off the end returns from the entry point.
#[derive(Debug, Clone, Default)]
pub(crate) struct Program {
    steps: Vec<Step>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call(self, syscall: Syscall, args: [usize; 5]) -> Self {
        self.raw(syscall as usize, args)
    }

    pub fn raw(mut self, syscall: usize, args: [usize; 5]) -> Self {
        self.steps.push(Step { syscall, args });
        self
    }

    pub fn repeat(mut self, syscall: Syscall, args: [usize; 5], times: usize) -> Self {
        for _ in 0..times {
            self = self.call(syscall, args);
        }
        self
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockContext {
    pub entry: usize,
    pub stack_top: usize,
    pub exit_trampoline: usize,
    args: [usize; 5],
    ret: Option<isize>,
    step: usize,
}

impl ArchContext for MockContext {
    fn new(entry: usize, stack_top: usize, exit_trampoline: usize) -> Self {
        Self {
            entry,
            stack_top,
            exit_trampoline,
            ..Default::default()
        }
    }

    fn arg(&self, index: usize) -> usize {
        self.args[index]
    }

    fn set_arg(&mut self, index: usize, value: usize) {
        self.args[index] = value;
    }

    fn set_return(&mut self, value: isize) {
        self.ret = Some(value);
    }
}

/// Hardware activity injected as an interrupt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Stimulus {
    Timer,
    /// Bytes arrive on a channel.
    Receive(Channel, &'static [u8]),
    /// The transmit FIFO drains by this many bytes.
    TxRoom(Channel, usize),
    /// Interrupt trap with nothing pending.
    Spurious,
    Raw(u32),
}

#[derive(Debug, Default)]
pub(crate) struct MockIrq {
    pending: u32,
    pub completed: Vec<IrqSource>,
}

impl InterruptController for MockIrq {
    fn pending(&mut self) -> u32 {
        core::mem::take(&mut self.pending)
    }

    fn complete(&mut self, source: IrqSource) {
        self.completed.push(source);
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockTimer {
    now: u64,
    pub cleared: usize,
}

impl Timer for MockTimer {
    fn clear_interrupt(&mut self) {
        self.cleared += 1;
    }

    fn micros(&self) -> u64 {
        self.now
    }
}

#[derive(Debug)]
pub(crate) struct MockSerial {
    rx: [VecDeque<u8>; Channel::COUNT],
    tx: [Vec<u8>; Channel::COUNT],
    room: [usize; Channel::COUNT],
    /// Indexed by channel, then Rx/Tx.
    irq: [[bool; 2]; Channel::COUNT],
}

impl Default for MockSerial {
    fn default() -> Self {
        Self {
            rx: Default::default(),
            tx: Default::default(),
            room: [usize::MAX; Channel::COUNT],
            irq: [[false; 2]; Channel::COUNT],
        }
    }
}

fn irq_index(kind: SerialIrq) -> usize {
    match kind {
        SerialIrq::Rx => 0,
        SerialIrq::Tx => 1,
    }
}

impl MockSerial {
    pub fn sent(&self, channel: Channel) -> &[u8] {
        &self.tx[channel.index()]
    }

    pub fn unread(&self, channel: Channel) -> usize {
        self.rx[channel.index()].len()
    }

    pub fn irq_enabled(&self, channel: Channel, kind: SerialIrq) -> bool {
        self.irq[channel.index()][irq_index(kind)]
    }
}

impl Serial for MockSerial {
    fn can_read(&self, channel: Channel) -> bool {
        !self.rx[channel.index()].is_empty()
    }

    fn read(&mut self, channel: Channel) -> u8 {
        self.rx[channel.index()].pop_front().unwrap_or(0)
    }

    fn can_write(&self, channel: Channel) -> bool {
        self.room[channel.index()] > 0
    }

    fn write(&mut self, channel: Channel, byte: u8) {
        let room = &mut self.room[channel.index()];
        assert!(*room > 0, "transmit FIFO overflow");
        *room -= 1;
        self.tx[channel.index()].push(byte);
    }

    fn pending_irq(&self, channel: Channel) -> Option<SerialIrq> {
        if self.irq_enabled(channel, SerialIrq::Rx) && self.can_read(channel) {
            Some(SerialIrq::Rx)
        } else if self.irq_enabled(channel, SerialIrq::Tx) && self.can_write(channel) {
            Some(SerialIrq::Tx)
        } else {
            None
        }
    }

    fn set_irq(&mut self, channel: Channel, kind: SerialIrq, enabled: bool) {
        self.irq[channel.index()][irq_index(kind)] = enabled;
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockArch {
    programs: HashMap<usize, Program>,
    preempt: Vec<(usize, usize, Stimulus)>,
    idle_stimuli: VecDeque<Stimulus>,
    /// (entry, observed return value)
    observed: Vec<(usize, isize)>,
    /// (entry, step, resume count)
    issued: Vec<(usize, usize, usize)>,
    idle_polls: Vec<isize>,
    resumes: usize,
    pub irq: MockIrq,
    pub timer: MockTimer,
    pub serial: MockSerial,
    pub shut_down: bool,
}

impl MockArch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(mut self, entry: usize, program: Program) -> Self {
        self.programs.insert(entry, program);
        self
    }

    /// Raise `stimulus` at the next idle resume.
    pub fn on_idle(mut self, stimulus: Stimulus) -> Self {
        self.idle_stimuli.push_back(stimulus);
        self
    }

    /// Interrupt the task running `entry` just before it issues step `step`.
    pub fn preempt(mut self, entry: usize, step: usize, stimulus: Stimulus) -> Self {
        self.preempt.push((entry, step, stimulus));
        self
    }

    pub fn tx_room(mut self, channel: Channel, room: usize) -> Self {
        self.serial.room[channel.index()] = room;
        self
    }

    pub fn serial_irq(mut self, channel: Channel, kind: SerialIrq, enabled: bool) -> Self {
        self.serial.set_irq(channel, kind, enabled);
        self
    }

    /// Return values observed by the task running `entry`, in order.
    pub fn returns(&self, entry: usize) -> Vec<isize> {
        self.observed
            .iter()
            .filter(|(e, _)| *e == entry)
            .map(|(_, v)| *v)
            .collect()
    }

    /// When the task running `entry` issued step `step`.
    pub fn order_of(&self, entry: usize, step: usize) -> usize {
        self.issued
            .iter()
            .find(|(e, s, _)| *e == entry && *s == step)
            .map(|(_, _, seq)| *seq)
            .unwrap_or_else(|| panic!("{:#x} never issued step {}", entry, step))
    }

    /// `should-idle` results seen by the idle task.
    pub fn idle_polls(&self) -> &[isize] {
        &self.idle_polls
    }

    fn raise(&mut self, stimulus: Stimulus) {
        let source = match stimulus {
            Stimulus::Timer => IrqSource::Timer.mask(),
            Stimulus::Receive(channel, bytes) => {
                self.serial.rx[channel.index()].extend(bytes.iter().copied());
                serial_source(channel).mask()
            }
            Stimulus::TxRoom(channel, room) => {
                let current = &mut self.serial.room[channel.index()];
                *current = current.saturating_add(room);
                serial_source(channel).mask()
            }
            Stimulus::Spurious => 0,
            Stimulus::Raw(mask) => mask,
        };
        self.irq.pending |= source;
    }
}

fn serial_source(channel: Channel) -> IrqSource {
    match channel {
        Channel::Com1 => IrqSource::Com1,
        Channel::Com2 => IrqSource::Com2,
    }
}

impl Arch for MockArch {
    type Context = MockContext;
    type Interrupt = MockIrq;
    type Timer = MockTimer;
    type Serial = MockSerial;

    fn resume(&mut self, context: &mut MockContext) -> Trap {
        self.resumes += 1;
        assert!(self.resumes < RUNAWAY, "kernel never went quiescent");
        self.timer.now += SLICE_MICROS;
        let entry = context.entry;
        if let Some(i) = self
            .preempt
            .iter()
            .position(|&(e, s, _)| e == entry && s == context.step)
        {
            let (_, _, stimulus) = self.preempt.remove(i);
            self.raise(stimulus);
            return Trap::Interrupt;
        }
        if entry == IDLE {
            if let Some(stimulus) = self.idle_stimuli.pop_front() {
                self.raise(stimulus);
                return Trap::Interrupt;
            }
            let ret = context.ret.take();
            if let Some(polled) = ret {
                self.idle_polls.push(polled);
            }
            return match ret {
                Some(0) => Trap::Syscall(Syscall::Exit as usize),
                _ => Trap::Syscall(Syscall::ShouldIdle as usize),
            };
        }
        if let Some(value) = context.ret.take() {
            self.observed.push((entry, value));
        }
        let step = context.step;
        context.step += 1;
        self.issued.push((entry, step, self.resumes));
        let next = self
            .programs
            .get(&entry)
            .unwrap_or_else(|| panic!("no program for entry {:#x}", entry))
            .steps
            .get(step)
            .copied();
        match next {
            Some(Step { syscall, args }) => {
                context.args = args;
                Trap::Syscall(syscall)
            }
            None => {
                context.args = [0; 5];
                Trap::Syscall(Syscall::Exit as usize)
            }
        }
    }

    fn interrupt_controller(&mut self) -> &mut MockIrq {
        &mut self.irq
    }

    fn timer(&mut self) -> &mut MockTimer {
        &mut self.timer
    }

    fn serial(&mut self) -> &mut MockSerial {
        &mut self.serial
    }

    fn idle_entry(&self) -> usize {
        IDLE
    }

    fn exit_trampoline(&self) -> usize {
        EXIT_TRAMPOLINE
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

/// A kernel with idle and the first task scheduled, ready to `run`.
pub(crate) fn boot_kernel(
    arch: MockArch,
    stacks: &mut [Stack],
    entry: usize,
    priority: usize,
) -> Kernel<'_, MockArch> {
    let mut kernel = Kernel::new(arch, stacks, true);
    kernel.spawn_idle().unwrap();
    let init = kernel
        .spawn(Spawn::new(entry, Priority::new(priority).unwrap()))
        .unwrap();
    kernel.schedule(init);
    kernel
}

/// Boot, run to completion and hand back the board for inspection.
pub(crate) fn run(arch: MockArch, entry: usize, priority: usize) -> (MockArch, i32) {
    let mut stacks = stacks();
    let mut kernel = boot_kernel(arch, &mut stacks, entry, priority);
    let code = kernel.run();
    (kernel.into_arch(), code)
}
