//! Boot configuration
//!
//! Parses the boot command line into the network driver configuration.
//! Options are space separated `key=value` tokens; unknown tokens are
//! ignored and malformed values leave the default in place.

#![cfg_attr(not(test), no_std)]

use thiserror::Error;

/// Transmit ring length used when the command line does not set one
pub const DEFAULT_TX_RING_LEN: usize = 64;
/// Receive ring length used when the command line does not set one
pub const DEFAULT_RX_RING_LEN: usize = 128;
/// Ring lengths must be a multiple of this (8 descriptors = 128 bytes)
pub const RING_LEN_GRANULE: usize = 8;
/// Largest ring whose descriptor table still fits in one 4 KiB page
pub const MAX_RING_LEN: usize = 256;
/// Smallest receive ring: a long packet (16 KiB in 2 KiB buffers) must fit in
/// the slots hardware owns, which is every slot but the one at the tail
pub const MIN_RX_RING_LEN: usize = 16;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// Parse a level name, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Error,
            Self::Warn,
            Self::Info,
            Self::Debug,
            Self::Trace,
        ]
        .into_iter()
        .find(|level| level.name().eq_ignore_ascii_case(name))
    }

    /// Get level name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Rejected network configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("transmit ring length {0} is not a non-zero multiple of 8 up to 256")]
    TxRingLength(usize),
    #[error("receive ring length {0} is not a multiple of 8 between 16 and 256")]
    RxRingLength(usize),
}

/// Network driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    /// Station address override; `None` keeps the address the NIC reports
    pub mac: Option<[u8; 6]>,
    pub tx_ring_len: usize,
    pub rx_ring_len: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            mac: None,
            tx_ring_len: DEFAULT_TX_RING_LEN,
            rx_ring_len: DEFAULT_RX_RING_LEN,
        }
    }
}

impl NetConfig {
    /// Check that both rings satisfy the descriptor table constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !ring_len_is_valid(self.tx_ring_len) {
            return Err(ConfigError::TxRingLength(self.tx_ring_len));
        }
        if !rx_ring_len_is_valid(self.rx_ring_len) {
            return Err(ConfigError::RxRingLength(self.rx_ring_len));
        }
        Ok(())
    }
}

/// Whether `len` descriptors form a table the hardware accepts
pub fn ring_len_is_valid(len: usize) -> bool {
    len != 0 && len % RING_LEN_GRANULE == 0 && len <= MAX_RING_LEN
}

/// Whether a receive ring of `len` descriptors can always hold a whole frame
pub fn rx_ring_len_is_valid(len: usize) -> bool {
    ring_len_is_valid(len) && len >= MIN_RX_RING_LEN
}

/// Boot configuration parsed from command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootConfig {
    pub net: NetConfig,
    pub log_level: LogLevel,
}

impl BootConfig {
    /// Parse boot configuration from command line
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::default();

        // Bare `debug` is shorthand for loglevel=debug
        if has_flag(cmdline, "debug") {
            config.log_level = LogLevel::Debug;
        }

        // Explicit level wins over the debug flag (format: loglevel=NAME)
        if let Some(level) = find_value(cmdline, "loglevel").and_then(LogLevel::from_name) {
            config.log_level = level;
        }

        // Station address (format: mac=52:54:00:12:34:56)
        if let Some(mac_str) = find_value(cmdline, "mac") {
            if let Some(mac) = parse_mac(mac_str) {
                config.net.mac = Some(mac);
            }
        }

        // Ring lengths (format: txring=NN rxring=NN)
        if let Some(len) = find_value(cmdline, "txring").and_then(parse_usize) {
            config.net.tx_ring_len = len;
        }
        if let Some(len) = find_value(cmdline, "rxring").and_then(parse_usize) {
            config.net.rx_ring_len = len;
        }

        config
    }
}

/// Check for a bare flag token
fn has_flag(cmdline: &str, flag: &str) -> bool {
    cmdline.split_ascii_whitespace().any(|token| token == flag)
}

/// Find the value of a `key=value` token
fn find_value<'a>(cmdline: &'a str, key: &str) -> Option<&'a str> {
    cmdline
        .split_ascii_whitespace()
        .filter_map(|token| token.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, value)| value)
}

/// Parse a decimal usize, rejecting zero and trailing garbage
fn parse_usize(s: &str) -> Option<usize> {
    if s.is_empty() {
        return None;
    }
    let mut result: usize = 0;
    for c in s.chars() {
        let digit = c.to_digit(10)? as usize;
        result = result.checked_mul(10)?;
        result = result.checked_add(digit)?;
    }
    if result > 0 { Some(result) } else { None }
}

/// Parse MAC address from string (aa:bb:cc:dd:ee:ff format)
fn parse_mac(s: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.split(':');

    for byte in mac.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }

    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BootConfig::from_cmdline("");
        assert_eq!(config.net.mac, None);
        assert_eq!(config.net.tx_ring_len, 64);
        assert_eq!(config.net.rx_ring_len, 128);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.net.validate(), Ok(()));
    }

    #[test]
    fn test_full_cmdline() {
        let config =
            BootConfig::from_cmdline("quiet mac=52:54:00:AB:cd:0F txring=32 rxring=256 loglevel=TRACE");
        assert_eq!(config.net.mac, Some([0x52, 0x54, 0x00, 0xab, 0xcd, 0x0f]));
        assert_eq!(config.net.tx_ring_len, 32);
        assert_eq!(config.net.rx_ring_len, 256);
        assert_eq!(config.log_level, LogLevel::Trace);
    }

    #[test]
    fn test_debug_flag() {
        assert_eq!(BootConfig::from_cmdline("debug").log_level, LogLevel::Debug);
        assert_eq!(
            BootConfig::from_cmdline("debug loglevel=warn").log_level,
            LogLevel::Warn
        );
        // only whole tokens count
        assert_eq!(BootConfig::from_cmdline("nodebug").log_level, LogLevel::Info);
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let config = BootConfig::from_cmdline("mac=52:54:00 txring=abc rxring=0 loglevel=loud");
        assert_eq!(config, BootConfig::default());
    }

    #[test]
    fn test_keys_match_whole_tokens() {
        let config = BootConfig::from_cmdline("xtxring=16 txring=16");
        assert_eq!(config.net.tx_ring_len, 16);
        let config = BootConfig::from_cmdline("xtxring=16");
        assert_eq!(config.net.tx_ring_len, DEFAULT_TX_RING_LEN);
    }

    #[test]
    fn test_mac_parsing() {
        assert_eq!(parse_mac("00:11:22:33:44:55"), Some([0, 0x11, 0x22, 0x33, 0x44, 0x55]));
        assert_eq!(parse_mac("0:1:2:3:4:5"), Some([0, 1, 2, 3, 4, 5]));
        assert_eq!(parse_mac("00:11:22:33:44:55:66"), None);
        assert_eq!(parse_mac("00:11:22:33:44:5g"), None);
        assert_eq!(parse_mac("000:11:22:33:44:55"), None);
        assert_eq!(parse_mac("00::22:33:44:55"), None);
    }

    #[test]
    fn test_ring_validation() {
        let mut net = NetConfig::default();
        net.tx_ring_len = 12;
        assert_eq!(net.validate(), Err(ConfigError::TxRingLength(12)));
        net.tx_ring_len = 8;
        net.rx_ring_len = 512;
        assert_eq!(net.validate(), Err(ConfigError::RxRingLength(512)));
        assert!(ring_len_is_valid(256));
        assert!(!ring_len_is_valid(0));
    }

    #[test]
    fn test_receive_ring_holds_a_long_frame() {
        let mut net = NetConfig::default();
        net.rx_ring_len = 8;
        assert_eq!(net.validate(), Err(ConfigError::RxRingLength(8)));
        net.rx_ring_len = 16;
        assert_eq!(net.validate(), Ok(()));
        // transmit rings have no such floor
        net.tx_ring_len = 8;
        assert_eq!(net.validate(), Ok(()));
        assert!(!rx_ring_len_is_valid(8));
        assert!(rx_ring_len_is_valid(MIN_RX_RING_LEN));
    }
}
