#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

#[macro_use]
pub mod utils;

pub mod arch;
pub mod config;
pub mod event;
mod kernel;
pub mod task;
#[cfg(test)]
pub(crate) mod testing;

pub use kernel::{boot, Kernel};
