use core::{arch::global_asm, mem::offset_of, ptr::addr_of};

use cortex_a::{asm::barrier, registers::*};
use kestrel::arch::{ArchContext, Trap};
use tock_registers::interfaces::{Readable, Writeable};

/// Saved EL0 state of a task. The layout is shared with the trap assembly below.
#[repr(C, align(16))]
#[derive(Debug, Default, Clone)]
pub struct TrapFrame {
    pub x: [usize; 31],
    pub sp_el0: usize,
    pub elr: usize,
    pub spsr: usize,
    pub fpcr: usize,
    pub fpsr: usize,
    pub q: [u128; 32],
}

const _: () = {
    assert!(offset_of!(TrapFrame, sp_el0) == 248);
    assert!(offset_of!(TrapFrame, elr) == 256);
    assert!(offset_of!(TrapFrame, fpcr) == 272);
    assert!(offset_of!(TrapFrame, q) == 288);
};

/// EL0t with all interrupts unmasked.
const SPSR_EL0T: usize = 0;

impl ArchContext for TrapFrame {
    fn new(entry: usize, stack_top: usize, exit_trampoline: usize) -> Self {
        let mut frame = Self::default();
        frame.elr = entry;
        frame.sp_el0 = stack_top;
        frame.spsr = SPSR_EL0T;
        // Returning from `entry` lands in the trampoline.
        frame.x[30] = exit_trampoline;
        frame
    }

    // x0 carries the syscall number, arguments follow.
    #[inline]
    fn arg(&self, index: usize) -> usize {
        self.x[index + 1]
    }

    #[inline]
    fn set_arg(&mut self, index: usize, value: usize) {
        self.x[index + 1] = value;
    }

    #[inline]
    fn set_return(&mut self, value: isize) {
        self.x[0] = value as usize;
    }
}

#[repr(usize)]
#[derive(Debug)]
#[allow(unused)]
enum TrapKind {
    Synchronous = 0,
    Irq = 1,
}

const EC_SVC_AARCH64: u64 = 0b010101;

extern "C" {
    fn __kestrel_resume(frame: *mut TrapFrame) -> usize;
    static __kestrel_vectors: u8;
}

/// Enter the task described by `frame` and return once it traps.
pub fn resume(frame: &mut TrapFrame) -> Trap {
    let kind = unsafe { __kestrel_resume(frame) };
    if kind == TrapKind::Irq as usize {
        return Trap::Interrupt;
    }
    if ESR_EL1.read(ESR_EL1::EC) != EC_SVC_AARCH64 {
        panic!(
            "task fault: ESR={:#x} ELR={:#x} FAR={:#x}",
            ESR_EL1.get(),
            frame.elr,
            FAR_EL1.get()
        );
    }
    Trap::Syscall(frame.x[0])
}

pub fn install_vectors() {
    VBAR_EL1.set(unsafe { addr_of!(__kestrel_vectors) } as u64);
    unsafe { barrier::isb(barrier::SY) };
}

#[no_mangle]
extern "C" fn handle_unexpected_exception(vector: usize, esr: u64, elr: u64, far: u64) -> ! {
    const KINDS: [&str; 4] = ["synchronous", "IRQ", "FIQ", "SError"];
    const ORIGINS: [&str; 4] = ["EL1t", "EL1h", "EL0 AArch64", "EL0 AArch32"];
    panic!(
        "unexpected {} exception from {}: ESR={:#x} ELR={:#x} FAR={:#x}",
        KINDS[vector % 4],
        ORIGINS[vector / 4],
        esr,
        elr,
        far
    )
}

global_asm!(
    r#"
.section .text
.global __kestrel_resume
.global __kestrel_vectors

// Kernel frame: x19-x30, the trap frame pointer at #96, d8-d15 from #112.
.macro trap_entry kind
    stp x0, x1, [sp, #-16]!
    ldr x0, [sp, #112]
    stp x2, x3, [x0, #16]
    stp x4, x5, [x0, #32]
    stp x6, x7, [x0, #48]
    stp x8, x9, [x0, #64]
    stp x10, x11, [x0, #80]
    stp x12, x13, [x0, #96]
    stp x14, x15, [x0, #112]
    stp x16, x17, [x0, #128]
    stp x18, x19, [x0, #144]
    stp x20, x21, [x0, #160]
    stp x22, x23, [x0, #176]
    stp x24, x25, [x0, #192]
    stp x26, x27, [x0, #208]
    stp x28, x29, [x0, #224]
    str x30, [x0, #240]
    ldp x2, x3, [sp], #16
    stp x2, x3, [x0, #0]
    mrs x1, sp_el0
    str x1, [x0, #248]
    mrs x1, elr_el1
    mrs x2, spsr_el1
    stp x1, x2, [x0, #256]
    mrs x1, fpcr
    mrs x2, fpsr
    stp x1, x2, [x0, #272]
    add x1, x0, #288
    stp q0, q1, [x1, #0]
    stp q2, q3, [x1, #32]
    stp q4, q5, [x1, #64]
    stp q6, q7, [x1, #96]
    stp q8, q9, [x1, #128]
    stp q10, q11, [x1, #160]
    stp q12, q13, [x1, #192]
    stp q14, q15, [x1, #224]
    stp q16, q17, [x1, #256]
    stp q18, q19, [x1, #288]
    stp q20, q21, [x1, #320]
    stp q22, q23, [x1, #352]
    stp q24, q25, [x1, #384]
    stp q26, q27, [x1, #416]
    stp q28, q29, [x1, #448]
    stp q30, q31, [x1, #480]
    ldp x19, x20, [sp, #0]
    ldp x21, x22, [sp, #16]
    ldp x23, x24, [sp, #32]
    ldp x25, x26, [sp, #48]
    ldp x27, x28, [sp, #64]
    ldp x29, x30, [sp, #80]
    ldp d8, d9, [sp, #112]
    ldp d10, d11, [sp, #128]
    ldp d12, d13, [sp, #144]
    ldp d14, d15, [sp, #160]
    add sp, sp, #176
    mov x0, #\kind
    ret
.endm

.balign 4
__kestrel_resume:
    sub sp, sp, #176
    stp x19, x20, [sp, #0]
    stp x21, x22, [sp, #16]
    stp x23, x24, [sp, #32]
    stp x25, x26, [sp, #48]
    stp x27, x28, [sp, #64]
    stp x29, x30, [sp, #80]
    str x0, [sp, #96]
    stp d8, d9, [sp, #112]
    stp d10, d11, [sp, #128]
    stp d12, d13, [sp, #144]
    stp d14, d15, [sp, #160]
    ldr x1, [x0, #248]
    msr sp_el0, x1
    ldp x1, x2, [x0, #256]
    msr elr_el1, x1
    msr spsr_el1, x2
    ldp x1, x2, [x0, #272]
    msr fpcr, x1
    msr fpsr, x2
    add x1, x0, #288
    ldp q0, q1, [x1, #0]
    ldp q2, q3, [x1, #32]
    ldp q4, q5, [x1, #64]
    ldp q6, q7, [x1, #96]
    ldp q8, q9, [x1, #128]
    ldp q10, q11, [x1, #160]
    ldp q12, q13, [x1, #192]
    ldp q14, q15, [x1, #224]
    ldp q16, q17, [x1, #256]
    ldp q18, q19, [x1, #288]
    ldp q20, q21, [x1, #320]
    ldp q22, q23, [x1, #352]
    ldp q24, q25, [x1, #384]
    ldp q26, q27, [x1, #416]
    ldp q28, q29, [x1, #448]
    ldp q30, q31, [x1, #480]
    ldp x2, x3, [x0, #16]
    ldp x4, x5, [x0, #32]
    ldp x6, x7, [x0, #48]
    ldp x8, x9, [x0, #64]
    ldp x10, x11, [x0, #80]
    ldp x12, x13, [x0, #96]
    ldp x14, x15, [x0, #112]
    ldp x16, x17, [x0, #128]
    ldp x18, x19, [x0, #144]
    ldp x20, x21, [x0, #160]
    ldp x22, x23, [x0, #176]
    ldp x24, x25, [x0, #192]
    ldp x26, x27, [x0, #208]
    ldp x28, x29, [x0, #224]
    ldr x30, [x0, #240]
    ldp x0, x1, [x0, #0]
    eret

.balign 2048
__kestrel_vectors:
    .balign 0x80
    mov x0, #0
    b __kestrel_fault
    .balign 0x80
    mov x0, #1
    b __kestrel_fault
    .balign 0x80
    mov x0, #2
    b __kestrel_fault
    .balign 0x80
    mov x0, #3
    b __kestrel_fault
    .balign 0x80
    mov x0, #4
    b __kestrel_fault
    .balign 0x80
    mov x0, #5
    b __kestrel_fault
    .balign 0x80
    mov x0, #6
    b __kestrel_fault
    .balign 0x80
    mov x0, #7
    b __kestrel_fault
    .balign 0x80
    b __kestrel_trap_sync
    .balign 0x80
    b __kestrel_trap_irq
    .balign 0x80
    mov x0, #10
    b __kestrel_fault
    .balign 0x80
    mov x0, #11
    b __kestrel_fault
    .balign 0x80
    mov x0, #12
    b __kestrel_fault
    .balign 0x80
    mov x0, #13
    b __kestrel_fault
    .balign 0x80
    mov x0, #14
    b __kestrel_fault
    .balign 0x80
    mov x0, #15
    b __kestrel_fault

__kestrel_trap_sync:
    trap_entry 0

__kestrel_trap_irq:
    trap_entry 1

__kestrel_fault:
    mrs x1, esr_el1
    mrs x2, elr_el1
    mrs x3, far_el1
    bl handle_unexpected_exception
0:  wfe
    b 0b
"#
);
