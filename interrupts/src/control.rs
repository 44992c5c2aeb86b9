//! Processor side of interrupt handling: loading the table and the interrupt flag.

use bare_metal::cpu;
use bare_metal::cpu::io::PortIo;

use crate::idt::{self, Idt};
use crate::pic::ChainedPics;

pub trait InterruptControl {
    /// Make `idt` the active descriptor table.
    unsafe fn load_idt(&mut self, idt: &'static Idt);
    unsafe fn enable(&mut self);
    unsafe fn disable(&mut self);
    fn enabled(&self) -> bool;
}

/// The interrupt controls of the current CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuControl;

impl InterruptControl for CpuControl {
    unsafe fn load_idt(&mut self, table: &'static Idt) {
        idt::load_idt(table)
    }

    unsafe fn enable(&mut self) {
        cpu::enable_interrupts()
    }

    unsafe fn disable(&mut self) {
        cpu::disable_interrupts()
    }

    fn enabled(&self) -> bool {
        cpu::interrupts_enabled()
    }
}

/// Run `f` with maskable interrupts disabled, restoring the previous state afterwards.
pub fn without_interrupts<C, F, R>(control: &mut C, f: F) -> R
    where C: InterruptControl + ?Sized, F: FnOnce() -> R
{
    let was_enabled = control.enabled();
    if was_enabled {
        unsafe { control.disable() };
    }
    let result = f();
    if was_enabled {
        unsafe { control.enable() };
    }
    result
}

/// Activate interrupt handling. The order is fixed: the table must be complete before
/// the controllers are moved to their new vectors, and both must be done before the
/// table is loaded and interrupts are let in.
///
/// # Safety
///
/// Every present gate of `idt` must point to a valid entry stub.
pub unsafe fn bring_up<P, C>(idt: &'static Idt, pics: &mut ChainedPics<P>, control: &mut C)
    where P: PortIo, C: InterruptControl + ?Sized
{
    info!("[idt] {} gates present", idt.present_count());
    pics.initialize();
    control.load_idt(idt);
    control.enable();
    info!("[idt] interrupts enabled");
}

#[cfg(test)]
mod test {
    use super::*;
    use bare_metal::cpu::io::PortNumber;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Out(u16, u8),
        In(u16),
        LoadIdt(usize),
        Enable,
        Disable,
        Work,
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct Ports(Log);

    impl PortIo for Ports {
        unsafe fn outb(&mut self, port: PortNumber, data: u8) {
            self.0.borrow_mut().push(Event::Out(port.0, data));
        }

        unsafe fn inb(&mut self, port: PortNumber) -> u8 {
            self.0.borrow_mut().push(Event::In(port.0));
            0
        }
    }

    struct Control {
        log: Log,
        enabled: bool,
    }

    impl InterruptControl for Control {
        unsafe fn load_idt(&mut self, idt: &'static Idt) {
            self.log.borrow_mut().push(Event::LoadIdt(idt as *const Idt as usize));
        }

        unsafe fn enable(&mut self) {
            self.enabled = true;
            self.log.borrow_mut().push(Event::Enable);
        }

        unsafe fn disable(&mut self) {
            self.enabled = false;
            self.log.borrow_mut().push(Event::Disable);
        }

        fn enabled(&self) -> bool {
            self.enabled
        }
    }

    static IDT: Idt = Idt::new();

    #[test]
    fn bring_up_order() {
        let log = Log::default();
        let mut pics = ChainedPics::new(Ports(log.clone()));
        let mut control = Control { log: log.clone(), enabled: false };
        unsafe { bring_up(&IDT, &mut pics, &mut control) };

        let events = log.borrow();
        let load = events.iter().position(|e| matches!(e, Event::LoadIdt(_))).unwrap();
        let enable = events.iter().position(|e| *e == Event::Enable).unwrap();
        let last_port = events.iter().rposition(|e| matches!(e, Event::Out(..) | Event::In(_))).unwrap();
        assert_eq!(events[0], Event::Out(0x20, 0x11));
        assert!(last_port < load);
        assert!(load < enable);
        assert_eq!(enable, events.len() - 1);
        assert_eq!(events[load], Event::LoadIdt(&IDT as *const Idt as usize));
        assert!(control.enabled);
    }

    #[test]
    fn masked_section_restores_state() {
        let log = Log::default();
        let mut control = Control { log: log.clone(), enabled: true };
        let value = without_interrupts(&mut control, || {
            log.borrow_mut().push(Event::Work);
            42
        });
        assert_eq!(value, 42);
        assert_eq!(*log.borrow(), [Event::Disable, Event::Work, Event::Enable]);
        assert!(control.enabled);

        // already masked: nothing is touched
        log.borrow_mut().clear();
        control.enabled = false;
        without_interrupts(&mut control, || log.borrow_mut().push(Event::Work));
        assert_eq!(*log.borrow(), [Event::Work]);
        assert!(!control.enabled);
    }
}
