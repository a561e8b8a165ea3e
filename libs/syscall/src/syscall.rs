#[allow(unused)]
use core::arch::asm;

use bytemuck::Pod;

use crate::{
    decode, AwaitError, CreateError, EventId, ReplyError, SendError, TaskId, TaskInfo,
    TaskInfoError,
};

#[repr(usize)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Syscall {
    Create = 0,
    /// Yield the current task
    Pass = 1,
    Exit = 2,
    MyTid = 3,
    MyParentTid = 4,
    Send = 5,
    Receive = 6,
    Reply = 7,
    Await = 8,
    Rand = 9,
    ShouldIdle = 10,
    TaskInfo = 11,
    IdlePermille = 12,
    Halt = 13,
    /// Reserved for traps raised by hardware interrupts
    Interrupt = 37,
}

impl Syscall {
    #[inline]
    pub const fn from_usize(v: usize) -> Option<Self> {
        Some(match v {
            0 => Self::Create,
            1 => Self::Pass,
            2 => Self::Exit,
            3 => Self::MyTid,
            4 => Self::MyParentTid,
            5 => Self::Send,
            6 => Self::Receive,
            7 => Self::Reply,
            8 => Self::Await,
            9 => Self::Rand,
            10 => Self::ShouldIdle,
            11 => Self::TaskInfo,
            12 => Self::IdlePermille,
            13 => Self::Halt,
            37 => Self::Interrupt,
            _ => return None,
        })
    }
}

#[inline]
#[cfg(not(target_arch = "aarch64"))]
pub fn syscall(_syscall: Syscall, _args: &[usize]) -> isize {
    unimplemented!()
}

#[inline]
#[cfg(target_arch = "aarch64")]
pub fn syscall(syscall: Syscall, args: &[usize]) -> isize {
    debug_assert!(args.len() <= 5);
    let a: usize = args.first().cloned().unwrap_or(0);
    let b: usize = args.get(1).cloned().unwrap_or(0);
    let c: usize = args.get(2).cloned().unwrap_or(0);
    let d: usize = args.get(3).cloned().unwrap_or(0);
    let e: usize = args.get(4).cloned().unwrap_or(0);
    let ret: isize;
    unsafe {
        asm!("svc #0",
            inout("x0") syscall as usize => ret,
            in("x1") a, in("x2") b, in("x3") c, in("x4") d, in("x5") e,
        );
    }
    ret
}

#[inline]
pub fn create(priority: u32, entry: extern "C" fn()) -> Result<TaskId, CreateError> {
    decode(syscall(Syscall::Create, &[priority as usize, entry as usize])).map(|t| TaskId(t as u32))
}

#[inline]
pub fn pass() {
    syscall(Syscall::Pass, &[]);
}

#[inline]
pub fn exit() -> ! {
    syscall(Syscall::Exit, &[]);
    unreachable!()
}

/// Return address of every task entry point.
pub extern "C" fn exit_trampoline() -> ! {
    exit()
}

#[inline]
pub fn my_tid() -> TaskId {
    TaskId(syscall(Syscall::MyTid, &[]) as u32)
}

#[inline]
pub fn my_parent_tid() -> TaskId {
    TaskId(syscall(Syscall::MyParentTid, &[]) as u32)
}

/// Blocks until `to` replies. Returns the reply length.
#[inline]
pub fn send(to: TaskId, msg: &[u8], reply: &mut [u8]) -> Result<usize, SendError> {
    decode(syscall(
        Syscall::Send,
        &[
            to.as_usize(),
            msg.as_ptr() as usize,
            msg.len(),
            reply.as_mut_ptr() as usize,
            reply.len(),
        ],
    ))
}

#[inline]
pub fn send_as<T: Pod, R: Pod>(to: TaskId, msg: &T, reply: &mut R) -> Result<usize, SendError> {
    send(to, bytemuck::bytes_of(msg), bytemuck::bytes_of_mut(reply))
}

/// Blocks until a message arrives. Returns the number of bytes copied into `buf`.
#[inline]
pub fn receive(from: &mut TaskId, buf: &mut [u8]) -> usize {
    syscall(
        Syscall::Receive,
        &[from as *mut TaskId as usize, buf.as_mut_ptr() as usize, buf.len()],
    ) as usize
}

#[inline]
pub fn receive_as<T: Pod>(from: &mut TaskId, msg: &mut T) -> usize {
    receive(from, bytemuck::bytes_of_mut(msg))
}

#[inline]
pub fn reply(to: TaskId, msg: &[u8]) -> Result<(), ReplyError> {
    decode(syscall(
        Syscall::Reply,
        &[to.as_usize(), msg.as_ptr() as usize, msg.len()],
    ))
    .map(|_| ())
}

#[inline]
pub fn reply_as<T: Pod>(to: TaskId, msg: &T) -> Result<(), ReplyError> {
    reply(to, bytemuck::bytes_of(msg))
}

/// Blocks until `event` occurs. Returns the event data.
#[inline]
pub fn await_event(event: EventId) -> Result<usize, AwaitError> {
    decode(syscall(Syscall::Await, &[event.index(), 0, 0]))
}

/// Fill `buf` from a serial read event.
#[inline]
pub fn await_read(event: EventId, buf: &mut [u8]) -> Result<usize, AwaitError> {
    decode(syscall(
        Syscall::Await,
        &[event.index(), buf.as_mut_ptr() as usize, buf.len()],
    ))
}

/// Drain `buf` into a serial write event.
#[inline]
pub fn await_write(event: EventId, buf: &[u8]) -> Result<usize, AwaitError> {
    decode(syscall(
        Syscall::Await,
        &[event.index(), buf.as_ptr() as usize, buf.len()],
    ))
}

/// Like [`await_write`], but waits its turn while another task is already writing to `event`.
#[inline]
pub fn await_write_shared(event: EventId, buf: &[u8]) -> Result<usize, AwaitError> {
    retry_while_busy(|| await_write(event, buf), pass)
}

/// Run `op` until it stops failing with [`AwaitError::MultipleWaiters`], calling `wait` between
/// attempts.
pub fn retry_while_busy(
    mut op: impl FnMut() -> Result<usize, AwaitError>,
    mut wait: impl FnMut(),
) -> Result<usize, AwaitError> {
    loop {
        match op() {
            Err(AwaitError::MultipleWaiters) => wait(),
            result => return result,
        }
    }
}

#[inline]
pub fn rand() -> u32 {
    syscall(Syscall::Rand, &[]) as u32
}

/// Number of tasks blocked on an event. Zero means nothing can ever wake the system again.
#[inline]
pub fn should_idle() -> usize {
    syscall(Syscall::ShouldIdle, &[]) as usize
}

#[inline]
pub fn task_info(tid: TaskId) -> Result<TaskInfo, TaskInfoError> {
    let mut info = TaskInfo::default();
    decode(syscall(
        Syscall::TaskInfo,
        &[tid.as_usize(), &mut info as *mut TaskInfo as usize],
    ))
    .map(|_| info)
}

#[inline]
pub fn idle_permille() -> usize {
    syscall(Syscall::IdlePermille, &[]) as usize
}

#[inline]
pub fn halt() -> ! {
    syscall(Syscall::Halt, &[]);
    unreachable!()
}
