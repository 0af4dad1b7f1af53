//! smoltcp Device trait implementation for E1000

use crate::drivers::e1000::{E1000, RegisterWindow};
use alloc::vec;
use alloc::vec::Vec;
use log::debug;
use smoltcp::phy::{self, Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

/// Largest frame handed to smoltcp, Ethernet header included
pub const MTU: usize = 1514;

/// Borrowed E1000 presented to smoltcp
pub struct NicDevice<'a, R: RegisterWindow> {
    nic: &'a mut E1000<R>,
}

impl<'a, R: RegisterWindow> NicDevice<'a, R> {
    pub fn new(nic: &'a mut E1000<R>) -> Self {
        Self { nic }
    }
}

impl<R: RegisterWindow> Device for NicDevice<'_, R> {
    type RxToken<'b>
        = NicRxToken
    where
        Self: 'b;
    type TxToken<'b>
        = NicTxToken<'b, R>
    where
        Self: 'b;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        // The frame is taken off the ring here so the token never comes up empty
        let frame = self.nic.receive_vec().ok()?;
        Some((NicRxToken { frame }, NicTxToken { nic: &mut *self.nic }))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if !self.nic.can_transmit(MTU) {
            return None;
        }
        Some(NicTxToken { nic: &mut *self.nic })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        caps.max_transmission_unit = MTU;
        caps.max_burst_size = Some(1);
        caps
    }
}

/// RX token carrying one received frame
pub struct NicRxToken {
    frame: Vec<u8>,
}

impl phy::RxToken for NicRxToken {
    fn consume<T, F>(self, f: F) -> T
    where
        F: FnOnce(&[u8]) -> T,
    {
        f(&self.frame)
    }
}

/// TX token for transmitting packets
pub struct NicTxToken<'a, R: RegisterWindow> {
    nic: &'a mut E1000<R>,
}

impl<R: RegisterWindow> phy::TxToken for NicTxToken<'_, R> {
    fn consume<T, F>(self, len: usize, f: F) -> T
    where
        F: FnOnce(&mut [u8]) -> T,
    {
        let mut buffer = vec![0u8; len];
        let result = f(&mut buffer);

        if let Err(e) = self.nic.transmit(&buffer) {
            debug!("NET: dropped outgoing frame of {} bytes: {}", len, e);
        }

        result
    }
}
