//! The table of Rust level handlers and the dispatch of trapped vectors.

use core::fmt;

use bare_metal::cpu::io::PortIo;

use crate::frame::TrapFrame;
use crate::idt::VECTOR_COUNT;
use crate::pic::ChainedPics;

/// Receives the snapshot of the interrupted state.
pub type Handler = fn(&TrapFrame);

/// Number of vectors reserved for CPU exceptions.
pub const EXCEPTION_COUNT: usize = 32;

const EXCEPTION_NAMES: [&str; EXCEPTION_COUNT] = [
    "divide error",
    "debug",
    "non-maskable interrupt",
    "breakpoint",
    "overflow",
    "bound range exceeded",
    "invalid opcode",
    "device not available",
    "double fault",
    "coprocessor segment overrun",
    "invalid TSS",
    "segment not present",
    "stack-segment fault",
    "general protection fault",
    "page fault",
    "reserved",
    "x87 floating point exception",
    "alignment check",
    "machine check",
    "SIMD floating point exception",
    "virtualization exception",
    "control protection exception",
    "reserved",
    "reserved",
    "reserved",
    "reserved",
    "reserved",
    "reserved",
    "hypervisor injection exception",
    "VMM communication exception",
    "security exception",
    "reserved",
];

/// Vectors for which the processor pushes an error code.
pub fn has_error_code(vector: usize) -> bool {
    matches!(vector, 8 | 10 | 11 | 12 | 13 | 14 | 17 | 21 | 29 | 30)
}

/// Human readable name of a vector.
pub fn vector_name(vector: usize) -> &'static str {
    match vector {
        0..=31 => EXCEPTION_NAMES[vector],
        32..=47 => "hardware interrupt",
        _ => "software interrupt",
    }
}

/// Whether an unhandled occurrence leaves the machine in an unknown state.
/// Debug and breakpoint traps resume after the trapping instruction and are harmless,
/// a non-maskable interrupt is an external event and not a fault of the running code.
pub fn is_fatal_when_unhandled(vector: usize) -> bool {
    vector < EXCEPTION_COUNT && !matches!(vector, 1 | 2 | 3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// A CPU fault arrived without anybody to handle it.
    UnhandledException { vector: u64, error_code: u64, rip: u64 },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DispatchError::UnhandledException { vector, error_code, rip } => write!(
                f, "unhandled {} (vector {}, error code {:#x}) at {:#018x}",
                vector_name(vector as usize), vector, error_code, rip
            ),
        }
    }
}

/// 256 slots, each empty or holding one handler. Registration overwrites, nothing is ever removed.
pub struct InterruptRegistry {
    handlers: [Option<Handler>; VECTOR_COUNT],
}

impl InterruptRegistry {
    pub const fn new() -> Self {
        InterruptRegistry { handlers: [None; VECTOR_COUNT] }
    }

    /// Install `handler` for `vector`. Returns `false`, and changes nothing, if the vector is out of range.
    pub fn register_handler(&mut self, vector: usize, handler: Handler) -> bool {
        match self.handlers.get_mut(vector) {
            Some(slot) => {
                if slot.is_some() {
                    debug!("[idt] replacing handler for vector {}", vector);
                }
                *slot = Some(handler);
                true
            }
            None => {
                warn!("[idt] ignoring handler for invalid vector {}", vector);
                false
            }
        }
    }

    pub fn is_registered(&self, vector: usize) -> bool {
        self.handler(vector).is_some()
    }

    pub fn handler(&self, vector: usize) -> Option<Handler> {
        self.handlers.get(vector).copied().flatten()
    }

    /// Route a trapped vector to its handler.
    ///
    /// Controller lines are acknowledged after the handler returned, whether there was one
    /// or not. An unhandled fault is reported back, as execution cannot simply resume.
    pub fn dispatch<P: PortIo>(&self, frame: &TrapFrame, pics: &mut ChainedPics<P>) -> Result<(), DispatchError> {
        let vector = frame.vector as usize;
        match self.handler(vector) {
            Some(handler) => handler(frame),
            None if is_fatal_when_unhandled(vector) => {
                return Err(DispatchError::UnhandledException {
                    vector: frame.vector,
                    error_code: frame.error_code,
                    rip: frame.rip,
                });
            }
            None => warn!("[idt] dropping unhandled {} (vector {})", vector_name(vector), vector),
        }

        if pics.handles_interrupt(vector) {
            unsafe { pics.notify_end_of_interrupt(vector) };
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pic::test::{Access, RecordingPorts};
    use bare_metal::cpu::io::PortNumber;
    use std::cell::RefCell;
    use std::vec::Vec;

    thread_local! {
        static SEEN: RefCell<Vec<(&'static str, u64)>> = RefCell::new(Vec::new());
    }

    fn record(name: &'static str, frame: &TrapFrame) {
        SEEN.with(|seen| seen.borrow_mut().push((name, frame.vector)));
    }

    fn first(frame: &TrapFrame) {
        record("first", frame)
    }

    fn second(frame: &TrapFrame) {
        record("second", frame)
    }

    fn seen() -> Vec<(&'static str, u64)> {
        SEEN.with(|seen| seen.borrow_mut().drain(..).collect())
    }

    fn pics() -> ChainedPics<RecordingPorts> {
        ChainedPics::new(RecordingPorts::default())
    }

    #[test]
    fn registration() {
        let mut registry = InterruptRegistry::new();
        assert!(!registry.is_registered(33));
        assert!(registry.register_handler(33, first));
        assert!(registry.is_registered(33));
        assert!(registry.register_handler(255, first));
        assert!(!registry.register_handler(256, first));
        assert!(!registry.is_registered(256));
    }

    #[test]
    fn dispatch_calls_registered_handler() {
        let mut registry = InterruptRegistry::new();
        registry.register_handler(14, first);
        registry.register_handler(0x80, second);
        let mut pics = pics();

        let mut frame = TrapFrame::for_vector(14);
        frame.error_code = 2;
        assert_eq!(registry.dispatch(&frame, &mut pics), Ok(()));
        assert_eq!(registry.dispatch(&TrapFrame::for_vector(0x80), &mut pics), Ok(()));
        assert_eq!(seen(), [("first", 14), ("second", 0x80)]);
        // neither is a controller line
        assert!(pics.ports().log.is_empty());
    }

    #[test]
    fn reregistration_overwrites() {
        let mut registry = InterruptRegistry::new();
        registry.register_handler(32, first);
        registry.register_handler(32, second);
        registry.dispatch(&TrapFrame::for_vector(32), &mut pics()).unwrap();
        assert_eq!(seen(), [("second", 32)]);
    }

    /// Ports that log into the same place as the handlers, to observe ordering.
    struct SharedLogPorts;

    impl PortIo for SharedLogPorts {
        unsafe fn outb(&mut self, port: PortNumber, _data: u8) {
            SEEN.with(|seen| seen.borrow_mut().push(("out", port.0 as u64)));
        }

        unsafe fn inb(&mut self, _port: PortNumber) -> u8 {
            0
        }
    }

    #[test]
    fn end_of_interrupt_after_handler() {
        let mut registry = InterruptRegistry::new();
        registry.register_handler(44, first);
        registry.register_handler(32, second);
        let mut pics = ChainedPics::new(SharedLogPorts);

        registry.dispatch(&TrapFrame::for_vector(44), &mut pics).unwrap();
        assert_eq!(seen(), [("first", 44), ("out", 0xA0), ("out", 0x20)]);
        registry.dispatch(&TrapFrame::for_vector(32), &mut pics).unwrap();
        assert_eq!(seen(), [("second", 32), ("out", 0x20)]);
    }

    #[test]
    fn unhandled_vectors() {
        let registry = InterruptRegistry::new();
        let mut pics = pics();

        // hardware lines are still acknowledged
        assert_eq!(registry.dispatch(&TrapFrame::for_vector(33), &mut pics), Ok(()));
        assert_eq!(pics.ports().log, [Access::Out(0x20, 0x20)]);

        // harmless traps, the NMI and software vectors are dropped
        assert_eq!(registry.dispatch(&TrapFrame::for_vector(2), &mut pics), Ok(()));
        assert_eq!(registry.dispatch(&TrapFrame::for_vector(3), &mut pics), Ok(()));
        assert_eq!(registry.dispatch(&TrapFrame::for_vector(1), &mut pics), Ok(()));
        assert_eq!(registry.dispatch(&TrapFrame::for_vector(200), &mut pics), Ok(()));

        // faults are not
        let mut frame = TrapFrame::for_vector(13);
        frame.error_code = 0x10;
        frame.rip = 0xFFFF_8000_0000_1000;
        assert_eq!(registry.dispatch(&frame, &mut pics), Err(DispatchError::UnhandledException {
            vector: 13, error_code: 0x10, rip: 0xFFFF_8000_0000_1000,
        }));
        assert_eq!(pics.ports().log.len(), 1);
        assert!(seen().is_empty());
        assert!(!is_fatal_when_unhandled(2));
        assert!(is_fatal_when_unhandled(0));
    }

    #[test]
    fn names_and_error_codes() {
        assert_eq!(vector_name(14), "page fault");
        assert_eq!(vector_name(8), "double fault");
        assert_eq!(vector_name(40), "hardware interrupt");
        assert!(has_error_code(14));
        assert!(has_error_code(8));
        assert!(!has_error_code(3));
        assert!(!has_error_code(32));
    }
}
