pub use syscall::{PRIORITY_COUNT, PRIORITY_IDLE, PRIORITY_MAX, PRIORITY_MIN};

/// Size of the task pool.
pub const MAX_TASKS: usize = 64;

/// Per-task stack size in bytes.
pub const STACK_SIZE: usize = 64 * 1024;

/// Written at both ends of every task stack.
pub const STACK_CANARY: u64 = 0xdead_c0de_f00d_beef;

/// Periodic timer frequency.
pub const TICK_HZ: u64 = 100;

/// Tick count wraps within 31 bits so it stays a non-negative syscall return.
pub const TICK_MASK: usize = 0x7fff_ffff;

pub const RAND_SEED: u32 = 0xdead_beef;

/// Number of recent syscalls kept for diagnostics.
pub const TRACE_DEPTH: usize = 16;
