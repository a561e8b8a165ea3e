use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record};

use crate::uart::Console;

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        !cfg!(feature = "disable_log")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _guard = interrupt::uninterruptible();
        if let Some(mut console) = Console::new() {
            let _ = writeln!(
                console,
                "[{}][{}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if cfg!(feature = "disable_log") {
            LevelFilter::Off
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });
    }
}
