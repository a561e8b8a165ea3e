pub mod prng;
pub mod ring;

/// Check a kernel invariant. A violation is a kernel bug: log the location and condition, then panic
/// so the board halts the machine.
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {
        if !$cond {
            error!("KASSERT {}:{}: {}", file!(), line!(), stringify!($cond));
            panic!("kernel assertion failed: {}", stringify!($cond));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            error!("KASSERT {}:{}: {}: {}", file!(), line!(), stringify!($cond), format_args!($($arg)+));
            panic!("kernel assertion failed: {}", stringify!($cond));
        }
    };
}
