//! The kernel entry point, tying memory management and interrupt handling together.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

extern crate bare_metal;
extern crate interrupts;
extern crate kmem;

pub mod cmdline;
pub mod config;
pub mod layout;
pub mod logger;
pub mod memory;
pub mod pit;
pub mod traps;

#[cfg(not(test))]
mod panic;

use core::{slice, str};

use bare_metal::cpu;

use crate::config::KernelConfig;

/// Arguments passed to the kernel by the loader.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct KernelArgs {
    /// Size of physical memory in bytes, zero if unknown.
    pub memory_bytes: u64,
    /// Command line as UTF-8 bytes, may be null.
    pub cmdline_ptr: u64,
    pub cmdline_len: u64,
}

assert_eq_size!(KernelArgs, [u64; 3]);

impl KernelArgs {
    /// The command line, or an empty string if there is none or it is not valid UTF-8.
    ///
    /// # Safety
    ///
    /// A non-null `cmdline_ptr` must point to `cmdline_len` readable bytes that stay unchanged.
    pub unsafe fn cmdline(&self) -> &str {
        if self.cmdline_ptr == 0 || self.cmdline_len == 0 {
            return "";
        }
        let bytes = slice::from_raw_parts(self.cmdline_ptr as *const u8, self.cmdline_len as usize);
        str::from_utf8(bytes).unwrap_or("")
    }
}

/// This is the Rust entry point that is called by the assembly boot code after switching to long mode.
#[no_mangle]
pub extern "C" fn kernel_main(args: &KernelArgs) -> ! {
    logger::init(config::DEFAULT_LOG_LEVEL);
    let cmdline = unsafe { args.cmdline() };
    let config = KernelConfig::from_cmdline(args.memory_bytes as usize, cmdline);
    logger::set_level(config.log_level);
    info!("[boot] command line \"{}\"", cmdline);
    info!("[boot] {:?}", config);

    if let Err(err) = memory::init(&config) {
        panic!("[boot] {}", err);
    }
    traps::init(&config);

    if let (Some(frames), Some(heap)) = (memory::frame_stats(), memory::heap_stats()) {
        info!("[boot] {} of {} frames free, heap {} bytes", frames.free, frames.total, heap.donated);
    }

    let mut reported = 0;
    loop {
        unsafe { cpu::hlt() };
        let seconds = traps::ticks() / config.timer_hz as u64;
        if seconds != reported && seconds % 10 == 0 {
            reported = seconds;
            debug!("[boot] up {} s", seconds);
        }
    }
}
