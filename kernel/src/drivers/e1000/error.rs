//! E1000 driver errors

use crate::memory::dma::DmaError;
use thiserror::Error;

/// Fatal failure while bringing up a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("no e1000 device found")]
    DeviceNotFound,
    #[error("device did not respond to enablement")]
    DeviceNotEnabled,
    #[error("could not map register window at {base:#x} ({size:#x} bytes)")]
    RegisterMapFailed { base: u64, size: usize },
    #[error("register window of {size:#x} bytes is too small")]
    RegisterWindowTooSmall { size: usize },
    #[error("invalid {ring} ring length {len}")]
    InvalidRingLength { ring: &'static str, len: usize },
    #[error("descriptor ring allocation failed: {0}")]
    Dma(#[from] DmaError),
}

/// Transmit failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TxError {
    /// The next slot is still owned by hardware; retry later
    #[error("transmit ring full")]
    RingFull,
    /// The frame needs more segments than the ring can hold at once
    #[error("frame of {len} bytes exceeds the {max} byte ring capacity")]
    FrameTooLarge { len: usize, max: usize },
}

/// Receive failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RxError {
    /// No complete frame is waiting; retry later
    #[error("receive ring empty")]
    RingEmpty,
    /// The frame was consumed but did not fit the destination
    #[error("received frame truncated: {copied} bytes copied, {dropped} dropped")]
    Truncated { copied: usize, dropped: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn errors_render() {
        assert_eq!(TxError::RingFull.to_string(), "transmit ring full");
        assert_eq!(RxError::RingEmpty.to_string(), "receive ring empty");
        assert_eq!(
            AttachError::RegisterMapFailed { base: 0xfebc_0000, size: 0x20000 }.to_string(),
            "could not map register window at 0xfebc0000 (0x20000 bytes)"
        );
        assert_eq!(
            AttachError::InvalidRingLength { ring: "transmit", len: 12 }.to_string(),
            "invalid transmit ring length 12"
        );
    }

    #[test]
    fn dma_errors_convert() {
        let err: AttachError = DmaError::OutOfMemory { size: 4096 }.into();
        assert_eq!(err, AttachError::Dma(DmaError::OutOfMemory { size: 4096 }));
    }
}
