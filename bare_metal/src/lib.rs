//! Primitives shared by all kernel crates: address types, alignment helpers
//! and the handful of privileged CPU instructions the kernel needs.

#![cfg_attr(not(test), no_std)]

mod align;
mod addr;

pub mod cpu;
pub mod segments;

pub use self::align::*;
pub use self::addr::*;
