//! Log output to the first serial port.

use core::fmt::Write;

use bare_metal::cpu::io::com::{SerialPort, COM1_ADDR};
use interrupts::{without_interrupts, CpuControl};
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

pub static COM1: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1_ADDR) });

/// Writes `LEVEL [target] message` lines to COM1.
pub struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // an interrupt handler logging while we hold the port would deadlock
        without_interrupts(&mut CpuControl, || {
            let mut com1 = COM1.lock();
            let _ = writeln!(com1, "{:<5} [{}] {}", record.level(), record.target(), record.args());
        });
    }

    fn flush(&self) {}
}

/// Initialize COM1 and install the logger.
pub fn init(level: LevelFilter) {
    COM1.lock().init();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Change the maximum level after the command line was read.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
