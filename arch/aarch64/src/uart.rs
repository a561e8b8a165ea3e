use core::fmt;

use kestrel::arch::{Serial, SerialIrq};
use syscall::Channel;
use tock_registers::{
    interfaces::{ReadWriteable, Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

use crate::config::{COM1_BASE, COM2_BASE};

register_bitfields! [u32,
    FR [
        TXFF OFFSET(5) NUMBITS(1) [],
        RXFE OFFSET(4) NUMBITS(1) [],
    ],
    LCR_H [
        WLEN OFFSET(5) NUMBITS(2) [
            EightBit = 0b11
        ],
        FEN OFFSET(4) NUMBITS(1) [
            FifosDisabled = 0,
            FifosEnabled = 1
        ],
    ],
    CR [
        RXE OFFSET(9) NUMBITS(1) [],
        TXE OFFSET(8) NUMBITS(1) [],
        UARTEN OFFSET(0) NUMBITS(1) [],
    ],
    INT [
        RT OFFSET(6) NUMBITS(1) [],
        TX OFFSET(5) NUMBITS(1) [],
        RX OFFSET(4) NUMBITS(1) [],
    ],
];

register_structs! {
    #[allow(non_snake_case)]
    Pl011Registers {
        (0x00 => DR: ReadWrite<u32>),
        (0x04 => _reserved0),
        (0x18 => FR: ReadOnly<u32, FR::Register>),
        (0x1c => _reserved1),
        (0x24 => IBRD: WriteOnly<u32>),
        (0x28 => FBRD: WriteOnly<u32>),
        (0x2c => LCR_H: WriteOnly<u32, LCR_H::Register>),
        (0x30 => CR: WriteOnly<u32, CR::Register>),
        (0x34 => _reserved2),
        (0x38 => IMSC: ReadWrite<u32, INT::Register>),
        (0x3c => _reserved3),
        (0x40 => MIS: ReadOnly<u32, INT::Register>),
        (0x44 => ICR: WriteOnly<u32, INT::Register>),
        (0x48 => @END),
    }
}

pub struct Pl011 {
    regs: &'static Pl011Registers,
}

impl Pl011 {
    /// # Safety
    ///
    /// `base` must be the MMIO base of a PL011.
    pub unsafe fn new(base: usize) -> Self {
        Self {
            regs: unsafe { &*(base as *const Pl011Registers) },
        }
    }

    pub fn init(&self) {
        let uart = self.regs;
        uart.CR.set(0);
        uart.ICR.set(0x7ff);
        uart.IBRD.set(26);
        uart.FBRD.set(3);
        uart.LCR_H
            .write(LCR_H::WLEN::EightBit + LCR_H::FEN::FifosEnabled);
        uart.IMSC.set(0);
        uart.CR
            .write(CR::UARTEN::SET + CR::TXE::SET + CR::RXE::SET);
    }

    fn can_read(&self) -> bool {
        !self.regs.FR.is_set(FR::RXFE)
    }

    fn can_write(&self) -> bool {
        !self.regs.FR.is_set(FR::TXFF)
    }

    fn putchar(&self, c: u8) {
        while !self.can_write() {}
        self.regs.DR.set(c as u32);
    }

    fn pending_irq(&self) -> Option<SerialIrq> {
        let mis = self.regs.MIS.extract();
        if mis.is_set(INT::RX) || mis.is_set(INT::RT) {
            Some(SerialIrq::Rx)
        } else if mis.is_set(INT::TX) {
            Some(SerialIrq::Tx)
        } else {
            None
        }
    }

    fn set_irq(&self, kind: SerialIrq, enabled: bool) {
        let imsc = &self.regs.IMSC;
        match (kind, enabled) {
            (SerialIrq::Rx, true) => imsc.modify(INT::RX::SET + INT::RT::SET),
            (SerialIrq::Rx, false) => imsc.modify(INT::RX::CLEAR + INT::RT::CLEAR),
            (SerialIrq::Tx, true) => imsc.modify(INT::TX::SET),
            (SerialIrq::Tx, false) => imsc.modify(INT::TX::CLEAR),
        }
    }
}

/// Polled writer for the kernel's own output.
pub struct Console(Pl011);

impl Console {
    pub fn new() -> Option<Self> {
        COM2_BASE.map(|base| Self(unsafe { Pl011::new(base) }))
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.bytes() {
            if c == b'\n' {
                self.0.putchar(b'\r');
            }
            self.0.putchar(c);
        }
        Ok(())
    }
}

/// Both serial channels. An absent channel never has data and never has room.
pub struct Uarts {
    ports: [Option<Pl011>; Channel::COUNT],
}

impl Uarts {
    /// # Safety
    ///
    /// Must be created once.
    pub unsafe fn new() -> Self {
        let port = |base: Option<usize>| base.map(|base| unsafe { Pl011::new(base) });
        let uarts = Self {
            ports: [port(COM1_BASE), port(COM2_BASE)],
        };
        for uart in uarts.ports.iter().flatten() {
            uart.init();
        }
        uarts
    }

    fn port(&self, channel: Channel) -> Option<&Pl011> {
        self.ports[channel.index()].as_ref()
    }

    /// Mask every serial interrupt.
    pub fn quiesce(&mut self) {
        for uart in self.ports.iter().flatten() {
            uart.set_irq(SerialIrq::Rx, false);
            uart.set_irq(SerialIrq::Tx, false);
        }
    }
}

impl Serial for Uarts {
    fn can_read(&self, channel: Channel) -> bool {
        self.port(channel).is_some_and(Pl011::can_read)
    }

    fn read(&mut self, channel: Channel) -> u8 {
        self.port(channel)
            .map_or(0, |uart| uart.regs.DR.get() as u8)
    }

    fn can_write(&self, channel: Channel) -> bool {
        self.port(channel).is_some_and(Pl011::can_write)
    }

    fn write(&mut self, channel: Channel, byte: u8) {
        if let Some(uart) = self.port(channel) {
            uart.regs.DR.set(byte as u32);
        }
    }

    fn pending_irq(&self, channel: Channel) -> Option<SerialIrq> {
        self.port(channel).and_then(Pl011::pending_irq)
    }

    fn set_irq(&mut self, channel: Channel, kind: SerialIrq, enabled: bool) {
        if let Some(uart) = self.port(channel) {
            uart.set_irq(kind, enabled);
        }
    }
}
