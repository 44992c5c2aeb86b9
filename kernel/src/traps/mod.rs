//! Glue between the entry stubs and the interrupt registry.

mod stubs;

use core::sync::atomic::{AtomicU64, Ordering};

use bare_metal::cpu::io::CpuPorts;
use interrupts::{bring_up, without_interrupts, ChainedPics, CpuControl, Handler, Idt, InterruptIndex,
    InterruptRegistry, TrapFrame};
use spin::{Once, RwLock};

use crate::config::KernelConfig;
use crate::pit;

static IDT: Once<Idt> = Once::new();
static REGISTRY: RwLock<InterruptRegistry> = RwLock::new(InterruptRegistry::new());
static TICKS: AtomicU64 = AtomicU64::new(0);

/// The controllers keep their state in hardware, any instance drives the same pair.
fn pics() -> ChainedPics<CpuPorts> {
    ChainedPics::new(CpuPorts)
}

/// Called by the common entry stub with the saved state of the interrupted code.
extern "C" fn trap_entry(frame: &TrapFrame) {
    // read lock, a faulting handler re-enters here
    let result = REGISTRY.read().dispatch(frame, &mut pics());
    if let Err(err) = result {
        panic!("{}\n{:#x?}", err, frame);
    }
}

/// Install `handler` for `vector`. Handlers run with interrupts masked and must not register handlers.
pub fn register_handler(vector: usize, handler: Handler) -> bool {
    without_interrupts(&mut CpuControl, || REGISTRY.write().register_handler(vector, handler))
}

/// Number of timer interrupts since `init`.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

fn on_timer(_frame: &TrapFrame) {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Build the descriptor table, start the tick and enable interrupts.
pub fn init(config: &KernelConfig) {
    let idt = IDT.call_once(|| Idt::with_stubs(&stubs::STUBS));
    register_handler(InterruptIndex::TIMER.vector(), on_timer);
    unsafe {
        pit::set_frequency(&mut CpuPorts, config.timer_hz);
        bring_up(idt, &mut pics(), &mut CpuControl);
    }
}
