//! Kernel configuration, taken from the boot arguments and the command line.

use core::fmt;
use core::str::FromStr;

use log::LevelFilter;

use crate::cmdline::{CmdLine, Token};
use crate::pit;

/// Physical memory assumed when the boot layer does not report any.
pub const DEFAULT_MEMORY_BYTES: usize = 128 * 1024 * 1024;
pub const DEFAULT_TIMER_HZ: u32 = 100;
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Size of physical memory, starting at address zero.
    pub memory_bytes: usize,
    pub log_level: LevelFilter,
    /// Rate of the periodic tick.
    pub timer_hz: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdLineError {
    InvalidSize,
    InvalidLevel,
    InvalidFrequency,
}

impl fmt::Display for CmdLineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CmdLineError::InvalidSize => write!(f, "expected a size like 512M"),
            CmdLineError::InvalidLevel => write!(f, "expected off, error, warn, info, debug or trace"),
            CmdLineError::InvalidFrequency => write!(
                f, "expected a frequency between {} and {} Hz", pit::MIN_FREQUENCY, pit::BASE_FREQUENCY
            ),
        }
    }
}

impl KernelConfig {
    /// Defaults for the given amount of memory, zero meaning unknown.
    pub fn new(memory_bytes: usize) -> KernelConfig {
        KernelConfig {
            memory_bytes: if memory_bytes == 0 { DEFAULT_MEMORY_BYTES } else { memory_bytes },
            log_level: DEFAULT_LOG_LEVEL,
            timer_hz: DEFAULT_TIMER_HZ,
        }
    }

    /// Apply the options of a command line on top of the defaults.
    /// Malformed values keep their default, unknown options are skipped.
    pub fn from_cmdline(memory_bytes: usize, cmdline: &str) -> KernelConfig {
        let mut config = KernelConfig::new(memory_bytes);
        for token in CmdLine::parse(cmdline) {
            match token {
                Token::Pair(key, value) => {
                    if let Err(err) = config.apply(key, value) {
                        warn!("[boot] ignoring {}={}: {}", key, value, err);
                    }
                }
                Token::Flag(flag) => debug!("[boot] ignoring unknown flag {}", flag),
            }
        }
        config
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), CmdLineError> {
        match key {
            "mem" => self.memory_bytes = parse_size(value)?,
            "loglevel" => self.log_level = LevelFilter::from_str(value).map_err(|_| CmdLineError::InvalidLevel)?,
            "timer_hz" => self.timer_hz = parse_frequency(value)?,
            _ => debug!("[boot] ignoring unknown option {}", key),
        }
        Ok(())
    }
}

/// Parse a non-zero byte count with an optional `K`, `M` or `G` suffix (powers of 1024).
pub fn parse_size(value: &str) -> Result<usize, CmdLineError> {
    let (digits, shift) = match value.as_bytes().last() {
        Some(b'K') | Some(b'k') => (&value[..value.len() - 1], 10),
        Some(b'M') | Some(b'm') => (&value[..value.len() - 1], 20),
        Some(b'G') | Some(b'g') => (&value[..value.len() - 1], 30),
        _ => (value, 0),
    };
    let number = usize::from_str(digits).map_err(|_| CmdLineError::InvalidSize)?;
    match number.checked_mul(1 << shift) {
        Some(bytes) if bytes > 0 => Ok(bytes),
        _ => Err(CmdLineError::InvalidSize),
    }
}

fn parse_frequency(value: &str) -> Result<u32, CmdLineError> {
    match u32::from_str(value) {
        Ok(hz) if (pit::MIN_FREQUENCY..=pit::BASE_FREQUENCY).contains(&hz) => Ok(hz),
        _ => Err(CmdLineError::InvalidFrequency),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = KernelConfig::from_cmdline(0, "");
        assert_eq!(config, KernelConfig {
            memory_bytes: 128 * 1024 * 1024,
            log_level: LevelFilter::Info,
            timer_hz: 100,
        });
        assert_eq!(KernelConfig::new(64 << 20).memory_bytes, 64 << 20);
    }

    #[test]
    fn options() {
        let config = KernelConfig::from_cmdline(0, "quiet mem=256M loglevel=trace timer_hz=1000 foo=bar");
        assert_eq!(config.memory_bytes, 256 << 20);
        assert_eq!(config.log_level, LevelFilter::Trace);
        assert_eq!(config.timer_hz, 1000);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = KernelConfig::from_cmdline(32 << 20, "mem=lots loglevel=loud timer_hz=5");
        assert_eq!(config, KernelConfig::new(32 << 20));
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("64K"), Ok(64 << 10));
        assert_eq!(parse_size("512m"), Ok(512 << 20));
        assert_eq!(parse_size("2G"), Ok(2 << 30));
        assert_eq!(parse_size("0M"), Err(CmdLineError::InvalidSize));
        assert_eq!(parse_size("M"), Err(CmdLineError::InvalidSize));
        assert_eq!(parse_size("12T"), Err(CmdLineError::InvalidSize));
        assert_eq!(parse_size("99999999999999999999G"), Err(CmdLineError::InvalidSize));
    }
}
