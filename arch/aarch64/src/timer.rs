use cortex_a::{asm::barrier, registers::*};
use kestrel::arch::Timer;
use tock_registers::interfaces::{Readable, Writeable};

/// The EL1 physical timer, reloaded on every tick.
pub struct PhysicalTimer {
    frequency: u64,
    interval: u64,
}

impl PhysicalTimer {
    pub fn start(ticks_per_second: u64) -> Self {
        let frequency = CNTFRQ_EL0.get();
        let interval = frequency / ticks_per_second;
        unsafe { barrier::dsb(barrier::SY) };
        CNTP_TVAL_EL0.set(interval);
        CNTP_CTL_EL0.set(1);
        unsafe { barrier::isb(barrier::SY) };
        Self {
            frequency,
            interval,
        }
    }

    pub fn stop(&mut self) {
        CNTP_CTL_EL0.set(0);
    }
}

impl Timer for PhysicalTimer {
    fn clear_interrupt(&mut self) {
        CNTP_TVAL_EL0.set(self.interval);
    }

    fn micros(&self) -> u64 {
        unsafe { barrier::isb(barrier::SY) };
        let count = CNTPCT_EL0.get() as u128;
        (count * 1_000_000 / self.frequency as u128) as u64
    }
}
