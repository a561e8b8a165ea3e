//! QEMU `virt` memory map and interrupt lines.

pub const GICD_BASE: usize = 0x0800_0000;
pub const GICC_BASE: usize = 0x0801_0000;

/// The second serial channel is the console. `virt` has a single PL011.
pub const COM1_BASE: Option<usize> = None;
pub const COM2_BASE: Option<usize> = Some(0x0900_0000);

/// EL1 physical timer PPI.
pub const TIMER_IRQ: u32 = 30;
pub const UART0_IRQ: u32 = 33;

pub const INIT_PRIORITY: usize = 1;
