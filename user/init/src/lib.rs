//! The first user task, linked into the kernel image. It starts an echo pair and a ticker and
//! lets the system wind down once they finish.

#![no_std]

use core::{
    fmt::{self, Write},
    mem::size_of,
    sync::atomic::{AtomicU32, Ordering},
};

use bytemuck::{Pod, Zeroable};
use syscall::{EventId, TaskId};

const TICKER_PRIORITY: u32 = 1;
const SERVER_PRIORITY: u32 = 2;
const CLIENT_PRIORITY: u32 = 3;

const ROUNDS: u32 = 8;
const TICKS: usize = 50;

static SERVER: AtomicU32 = AtomicU32::new(0);

/// Fixed-size line buffer. Output past the end is dropped.
struct Line {
    buf: [u8; 128],
    len: usize,
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let n = s.len().min(self.buf.len() - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    let mut line = Line {
        buf: [0; 128],
        len: 0,
    };
    let _ = line.write_fmt(args);
    let _ = line.write_str("\r\n");
    // Another printer may hold the console; wait for it rather than drop the line.
    let _ = syscall::await_write_shared(EventId::Com2Write, &line.buf[..line.len]);
}

macro_rules! println {
    ($($arg:tt)*) => ({
        $crate::_print(format_args!($($arg)*))
    });
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Ping {
    seq: u32,
    value: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Pong {
    seq: u32,
    doubled: u32,
}

pub extern "C" fn init_main() {
    println!("init {} started", syscall::my_tid());
    let server = match syscall::create(SERVER_PRIORITY, echo_server) {
        Ok(tid) => tid,
        Err(e) => return println!("failed to start the echo server: {:?}", e),
    };
    SERVER.store(server.0, Ordering::Relaxed);
    for (priority, entry) in [
        (CLIENT_PRIORITY, echo_client as extern "C" fn()),
        (TICKER_PRIORITY, ticker),
    ] {
        if let Err(e) = syscall::create(priority, entry) {
            println!("create failed: {:?}", e);
        }
    }
}

/// Doubles every value it receives. Never exits; it stays receive-blocked once clients are gone.
extern "C" fn echo_server() {
    let mut from = TaskId::default();
    let mut ping = Ping::zeroed();
    loop {
        let len = syscall::receive_as(&mut from, &mut ping);
        if len != size_of::<Ping>() {
            println!("short message from {}: {} bytes", from, len);
            continue;
        }
        let pong = Pong {
            seq: ping.seq,
            doubled: ping.value.wrapping_mul(2),
        };
        if let Err(e) = syscall::reply_as(from, &pong) {
            println!("reply to {} failed: {:?}", from, e);
        }
    }
}

extern "C" fn echo_client() {
    let server = TaskId(SERVER.load(Ordering::Relaxed));
    let parent = syscall::my_parent_tid();
    for seq in 0..ROUNDS {
        let ping = Ping {
            seq,
            value: syscall::rand(),
        };
        let mut pong = Pong::zeroed();
        match syscall::send_as(server, &ping, &mut pong) {
            Ok(_) if pong.seq == seq && pong.doubled == ping.value.wrapping_mul(2) => {}
            Ok(_) => println!("bad echo {:?} for {:?}", pong, ping),
            Err(e) => return println!("send to {} failed: {:?}", server, e),
        }
    }
    println!("{} echoes from {} (parent {})", ROUNDS, server, parent);
}

extern "C" fn ticker() {
    for _ in 0..TICKS {
        match syscall::await_event(EventId::TimerTick) {
            Ok(tick) if tick % 10 == 0 => {
                println!("tick {}: idle {}‰", tick, syscall::idle_permille())
            }
            Ok(_) => {}
            Err(e) => return println!("await failed: {:?}", e),
        }
    }
    if let Ok(info) = syscall::task_info(syscall::my_tid()) {
        println!(
            "ticker ran {}us at priority {}",
            info.user_time_micros, info.priority
        );
    }
}
