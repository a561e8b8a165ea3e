#![no_std]
#![no_main]

#[macro_use]
extern crate log;

mod config;
mod context;
mod gic;
mod idle;
mod logger;
mod start;
mod timer;
mod uart;

use core::{arch::asm, panic::PanicInfo, ptr::addr_of_mut};

use cortex_a::{asm::barrier, registers::SCTLR_EL1};
use kestrel::{
    arch::{Arch, Trap},
    config::{MAX_TASKS, TICK_HZ},
    task::Stack,
};
use spin::Mutex;
use tock_registers::interfaces::{ReadWriteable, Writeable};

use context::TrapFrame;
use gic::Gic;
use timer::PhysicalTimer;
use uart::Uarts;

#[link_section = ".stacks"]
static mut STACKS: [Stack; MAX_TASKS] = {
    const EMPTY: Stack = Stack::ZERO;
    [EMPTY; MAX_TASKS]
};

pub struct QemuVirt {
    gic: Gic,
    timer: PhysicalTimer,
    uarts: Uarts,
}

impl Arch for QemuVirt {
    type Context = TrapFrame;
    type Interrupt = Gic;
    type Timer = PhysicalTimer;
    type Serial = Uarts;

    fn resume(&mut self, context: &mut TrapFrame) -> Trap {
        context::resume(context)
    }

    fn interrupt_controller(&mut self) -> &mut Gic {
        &mut self.gic
    }

    fn timer(&mut self) -> &mut PhysicalTimer {
        &mut self.timer
    }

    fn serial(&mut self) -> &mut Uarts {
        &mut self.uarts
    }

    fn idle_entry(&self) -> usize {
        idle::idle_main as usize
    }

    fn exit_trampoline(&self) -> usize {
        syscall::exit_trampoline as usize
    }

    fn shutdown(&mut self) {
        self.timer.stop();
        self.uarts.quiesce();
        self.gic.disable();
    }
}

fn display_banner() {
    info!(r"");
    info!(r" _  _ ____ ____ ___ ____ ____ _    ");
    info!(r" |_/  |___ [__   |  |__/ |___ |    ");
    info!(r" | \_ |___ ___]  |  |  \ |___ |___   v{}", env!("CARGO_PKG_VERSION"));
    info!(r"");
}

/// MMU off, caches for instructions only. EL0 may sleep with `wfi`.
fn setup_el1() {
    const NTWI: u64 = 1 << 16;
    const NTWE: u64 = 1 << 18;
    SCTLR_EL1.set((3 << 28) | (3 << 22) | (1 << 20) | (1 << 11) | NTWE | NTWI);
    SCTLR_EL1.modify(SCTLR_EL1::I::Cacheable);
    unsafe { barrier::isb(barrier::SY) };
}

#[no_mangle]
pub extern "C" fn kernel_main() -> ! {
    let uarts = unsafe { Uarts::new() };
    logger::init();
    display_banner();

    info!("setup EL1");
    setup_el1();
    context::install_vectors();

    info!("initialize GIC");
    let mut gic = unsafe { Gic::new(config::GICD_BASE, config::GICC_BASE) };
    gic.init();
    gic.enable(config::TIMER_IRQ);
    gic.enable(config::UART0_IRQ);

    info!("start timer at {}Hz", TICK_HZ);
    let timer = PhysicalTimer::start(TICK_HZ);

    let board = QemuVirt { gic, timer, uarts };
    let stacks = unsafe { &mut *addr_of_mut!(STACKS) };
    let code = kestrel::boot(
        board,
        stacks,
        init::init_main as usize,
        config::INIT_PRIORITY,
        cfg!(feature = "debug_report"),
    );
    halt(code)
}

fn halt(code: i32) -> ! {
    interrupt::disable();
    // Try QEMU exit service
    if cfg!(feature = "qemu") {
        let block = [0x20026u64, code as u64];
        unsafe {
            asm!(
                "hlt #0xF000",
                in("x0") 0x18u64,
                in("x1") block.as_ptr(),
                options(nostack)
            );
        }
    }
    info!("halted with code {}", code);
    loop {
        unsafe { asm!("wfe") };
    }
}

static PANIC_LOCK: Mutex<()> = Mutex::new(());

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    interrupt::disable();
    if let Some(_guard) = PANIC_LOCK.try_lock() {
        error!("{}", info);
        halt(1)
    }
    // Panicked while reporting a panic.
    halt(2)
}
