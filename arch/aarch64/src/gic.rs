use cortex_a::asm::barrier;
use kestrel::arch::{InterruptController, IrqSource};
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

use crate::config::{TIMER_IRQ, UART0_IRQ};

pub const IRQ_LINES: usize = 256;
const SPURIOUS: u32 = 1023;

register_structs! {
    #[allow(non_snake_case)]
    GicdRegisters {
        (0x000 => CTLR: ReadWrite<u32>),
        (0x004 => _reserved0),
        (0x100 => ISENABLER: [ReadWrite<u32>; 32]),
        (0x180 => ICENABLER: [ReadWrite<u32>; 32]),
        (0x200 => _reserved1),
        (0x280 => ICPENDR: [ReadWrite<u32>; 32]),
        (0x300 => _reserved2),
        (0x380 => ICACTIVER: [ReadWrite<u32>; 32]),
        (0x400 => IPRIORITYR: [ReadWrite<u32>; 256]),
        (0x800 => ITARGETSR: [ReadWrite<u32>; 256]),
        (0xc00 => ICFGR: [ReadWrite<u32>; 64]),
        (0xd00 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    GiccRegisters {
        (0x000 => CTLR: ReadWrite<u32>),
        (0x004 => PMR: ReadWrite<u32>),
        (0x008 => _reserved0),
        (0x00c => IAR: ReadOnly<u32>),
        (0x010 => EOIR: WriteOnly<u32>),
        (0x014 => @END),
    }
}

impl GicdRegisters {
    const CTLR_DISABLE: u32 = 0;
    const CTLR_ENABLE: u32 = 1;
    const IPRIORITYR_DEFAULT: u32 = 0xA0;
    const ITARGETSR_CORE0: u32 = 1;
}

impl GiccRegisters {
    const CTLR_DISABLE: u32 = 0;
    const CTLR_ENABLE: u32 = 1;
    const PMR_PRIORITY: u32 = 0xF0;
    const IAR_INTERRUPT_ID_MASK: u32 = 0x3FF;
}

/// GICv2, single core. At most one interrupt is acknowledged at a time.
pub struct Gic {
    gicd: &'static GicdRegisters,
    gicc: &'static GiccRegisters,
    acked: Option<u32>,
}

impl Gic {
    /// # Safety
    ///
    /// The addresses must be the distributor and CPU interface of the GIC, used by nothing else.
    pub unsafe fn new(gicd: usize, gicc: usize) -> Self {
        Self {
            gicd: unsafe { &*(gicd as *const GicdRegisters) },
            gicc: unsafe { &*(gicc as *const GiccRegisters) },
            acked: None,
        }
    }

    pub fn init(&mut self) {
        let (gicd, gicc) = (self.gicd, self.gicc);
        unsafe { barrier::dsb(barrier::SY) };
        gicd.CTLR.set(GicdRegisters::CTLR_DISABLE);
        for n in 0..(IRQ_LINES / 32) {
            gicd.ICENABLER[n].set(!0);
            gicd.ICPENDR[n].set(!0);
            gicd.ICACTIVER[n].set(!0);
        }
        let priority = GicdRegisters::IPRIORITYR_DEFAULT;
        for n in 0..(IRQ_LINES / 4) {
            gicd.IPRIORITYR[n].set(priority | priority << 8 | priority << 16 | priority << 24);
        }
        // SPIs are level triggered. The SGI and PPI banks are fixed.
        for n in 2..(IRQ_LINES / 16) {
            gicd.ICFGR[n].set(0);
        }
        gicd.CTLR.set(GicdRegisters::CTLR_ENABLE);
        gicc.PMR.set(GiccRegisters::PMR_PRIORITY);
        gicc.CTLR.set(GiccRegisters::CTLR_ENABLE);
        unsafe { barrier::dmb(barrier::SY) };
    }

    /// Route `irq` to core 0 and unmask it.
    pub fn enable(&mut self, irq: u32) {
        let (index, shift) = ((irq / 4) as usize, (irq % 4) * 8);
        let targets = self.gicd.ITARGETSR[index].get();
        self.gicd.ITARGETSR[index]
            .set(targets & !(0xff << shift) | GicdRegisters::ITARGETSR_CORE0 << shift);
        self.gicd.ISENABLER[(irq / 32) as usize].set(1 << (irq % 32));
        unsafe { barrier::dsb(barrier::SY) };
    }

    pub fn disable(&mut self) {
        self.gicc.CTLR.set(GiccRegisters::CTLR_DISABLE);
        self.gicd.CTLR.set(GicdRegisters::CTLR_DISABLE);
    }

    const fn source_of(irq: u32) -> Option<IrqSource> {
        match irq {
            TIMER_IRQ => Some(IrqSource::Timer),
            UART0_IRQ => Some(IrqSource::Com2),
            _ => None,
        }
    }
}

impl InterruptController for Gic {
    fn pending(&mut self) -> u32 {
        let iar = self.gicc.IAR.get();
        let irq = iar & GiccRegisters::IAR_INTERRUPT_ID_MASK;
        if irq == SPURIOUS {
            return 0;
        }
        self.acked = Some(iar);
        match Self::source_of(irq) {
            Some(source) => source.mask(),
            None => {
                error!("interrupt line {} has no source", irq);
                1 << 31
            }
        }
    }

    fn complete(&mut self, _source: IrqSource) {
        if let Some(iar) = self.acked.take() {
            self.gicc.EOIR.set(iar);
        }
    }
}
