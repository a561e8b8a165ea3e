#![cfg_attr(not(test), no_std)]

mod abi;
mod error;
mod syscall;

pub use abi::*;
pub use error::*;
pub use syscall::*;
