#![no_std]

#[cfg(target_arch = "aarch64")]
use core::arch::asm;

/// Unmask IRQs at the current exception level.
#[inline]
#[cfg(target_arch = "aarch64")]
pub fn enable() {
    unsafe { asm!("msr daifclr, #2") };
}

/// Mask IRQs at the current exception level.
#[inline]
#[cfg(target_arch = "aarch64")]
pub fn disable() {
    unsafe { asm!("msr daifset, #2") };
}

#[inline]
#[cfg(target_arch = "aarch64")]
pub fn is_enabled() -> bool {
    let daif: usize;
    unsafe { asm!("mrs {}, DAIF", out(reg) daif) };
    daif & (1 << 7) == 0
}

/// Wait for an interrupt. Safe to call with IRQs masked.
#[inline]
#[cfg(target_arch = "aarch64")]
pub fn wait() {
    unsafe { asm!("wfi") };
}

#[inline]
#[cfg(not(target_arch = "aarch64"))]
pub fn enable() {
    unimplemented!()
}

#[inline]
#[cfg(not(target_arch = "aarch64"))]
pub fn disable() {
    unimplemented!()
}

#[inline]
#[cfg(not(target_arch = "aarch64"))]
pub fn is_enabled() -> bool {
    unimplemented!()
}

#[inline]
#[cfg(not(target_arch = "aarch64"))]
pub fn wait() {
    unimplemented!()
}

/// Mask IRQs until the returned guard is dropped, then restore the previous mask.
#[inline]
pub fn uninterruptible() -> impl Drop {
    struct Guard {
        enabled: bool,
    }
    impl Drop for Guard {
        fn drop(&mut self) {
            if self.enabled {
                enable();
            }
        }
    }
    let enabled = is_enabled();
    if enabled {
        disable();
    }
    Guard { enabled }
}
