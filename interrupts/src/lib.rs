//! Interrupt handling for the first 48 vectors: the descriptor table, the
//! legacy interrupt controllers and the dispatch to registered handlers.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate static_assertions;
#[macro_use]
extern crate log;

extern crate bare_metal;

pub mod control;
pub mod frame;
pub mod idt;
pub mod pic;
pub mod registry;

pub use self::control::{bring_up, without_interrupts, CpuControl, InterruptControl};
pub use self::frame::TrapFrame;
pub use self::idt::{EntryStub, Idt};
pub use self::pic::{ChainedPics, InterruptIndex};
pub use self::registry::{DispatchError, Handler, InterruptRegistry};

/// Number of vectors backed by an entry stub: the 32 exceptions and the 16 controller lines.
pub const STUB_COUNT: usize = 48;
