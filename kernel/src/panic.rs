use core::fmt::Write;
use core::panic::PanicInfo;

use bare_metal::cpu;
use bare_metal::cpu::io::com::{SerialPort, COM1_ADDR};

use crate::logger;

#[panic_handler]
fn panic(panic_info: &PanicInfo) -> ! {
    unsafe { cpu::disable_interrupts() };

    // the port may be locked by the code that panicked, fall back to a fresh instance then
    match logger::COM1.try_lock() {
        Some(mut com1) => {
            let _ = writeln!(com1, "PANIC {}", panic_info);
        }
        None => {
            let mut com1 = unsafe { SerialPort::new(COM1_ADDR) };
            let _ = writeln!(com1, "PANIC {}", panic_info);
        }
    }

    unsafe { cpu::hang() }
}
