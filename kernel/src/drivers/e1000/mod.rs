//! Intel E1000 Network Driver
//!
//! Polled transmit and receive over the legacy descriptor rings. Nothing
//! here blocks: a full transmit ring or an empty receive ring is reported
//! immediately and the caller decides whether to spin, yield or back off.

mod descriptors;
mod error;
mod mmio;
mod regs;
mod ring;

#[cfg(test)]
pub(crate) mod testing;

use crate::memory::dma::AddressTranslator;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{Ordering, fence};
use log::{debug, info, trace, warn};
use nic_boot::{MIN_RX_RING_LEN, NetConfig, ring_len_is_valid, rx_ring_len_is_valid};

pub use descriptors::{RxDescriptor, RxStatus, TxCommand, TxDescriptor, TxStatus};
pub use error::{AttachError, RxError, TxError};
pub use mmio::{DeviceHandle, MmioRegion, MmioWindow, RegisterWindow};
pub use regs::*;
pub use ring::{RxRing, TxRing};

/// Network device statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    /// Transmit attempts rejected with `RingFull`
    pub tx_ring_full: u64,
    /// Frames that did not fit the caller's receive buffer
    pub rx_truncated: u64,
}

/// Largest payload of one transmit segment
pub const MAX_PKT_SIZE: usize = 1518;
/// Size of each receive buffer (RCTL buffer size class)
pub const MAX_BUF_SIZE: usize = 2048;
/// Longest frame the receiver writes with long packet reception on
pub const MAX_RX_FRAME: usize = 16384;

// Hardware must be able to finish any frame without software freeing a slot
const _: () = assert!(MIN_RX_RING_LEN - 1 >= MAX_RX_FRAME / MAX_BUF_SIZE);

/// Station address used when neither the config nor the NIC supplies one
pub const DEFAULT_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct E1000Config {
    pub mac: Option<[u8; 6]>,
    pub tx_ring_len: usize,
    pub rx_ring_len: usize,
}

impl Default for E1000Config {
    fn default() -> Self {
        Self::from(&NetConfig::default())
    }
}

impl From<&NetConfig> for E1000Config {
    fn from(net: &NetConfig) -> Self {
        Self {
            mac: net.mac,
            tx_ring_len: net.tx_ring_len,
            rx_ring_len: net.rx_ring_len,
        }
    }
}

/// Bring up the NIC behind `handle`
///
/// Enables the device, maps its registers and runs the init sequence.
pub fn attach<H, T>(
    handle: &mut H,
    translator: &T,
    config: &E1000Config,
) -> Result<E1000<H::Registers>, AttachError>
where
    H: DeviceHandle,
    T: AddressTranslator + ?Sized,
{
    let region = handle.enable_device()?;
    info!("E1000: attach {:#x} {:#x}", region.base, region.size);
    let regs = handle.map_registers(region)?;
    E1000::new(regs, translator, config)
}

/// E1000 Network Interface Controller
pub struct E1000<R: RegisterWindow> {
    regs: R,
    rx_ring: RxRing,
    tx_ring: TxRing,
    mac_address: [u8; 6],
    stats: DeviceStats,
}

impl<R: RegisterWindow> E1000<R> {
    /// Initialize a device whose registers are already mapped
    pub fn new<T>(regs: R, translator: &T, config: &E1000Config) -> Result<Self, AttachError>
    where
        T: AddressTranslator + ?Sized,
    {
        if regs.size() < REG_WINDOW_MIN {
            return Err(AttachError::RegisterWindowTooSmall { size: regs.size() });
        }
        if !ring_len_is_valid(config.tx_ring_len) {
            return Err(AttachError::InvalidRingLength {
                ring: "transmit",
                len: config.tx_ring_len,
            });
        }
        if !rx_ring_len_is_valid(config.rx_ring_len) {
            return Err(AttachError::InvalidRingLength {
                ring: "receive",
                len: config.rx_ring_len,
            });
        }

        // Receive slots are bound to their buffers and cleared here
        let rx_ring = RxRing::new(config.rx_ring_len, translator)?;
        let tx_ring = TxRing::new(config.tx_ring_len, translator)?;

        let mut device = Self {
            regs,
            rx_ring,
            tx_ring,
            mac_address: [0; 6],
            stats: DeviceStats::default(),
        };

        device.init_tx();
        device.init_mac(config.mac);
        device.init_rx();

        info!(
            "E1000: MAC address: {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            device.mac_address[0],
            device.mac_address[1],
            device.mac_address[2],
            device.mac_address[3],
            device.mac_address[4],
            device.mac_address[5]
        );
        Ok(device)
    }

    /// Read from a register
    fn read_reg(&self, reg: u32) -> u32 {
        self.regs.read(reg)
    }

    /// Write to a register
    fn write_reg(&mut self, reg: u32, value: u32) {
        self.regs.write(reg, value);
    }

    /// Program the transmit ring and enable the transmitter
    fn init_tx(&mut self) {
        let tx_desc_phys = self.tx_ring.descriptor_phys_addr();
        self.write_reg(REG_TDBAL, tx_desc_phys as u32);
        self.write_reg(REG_TDBAH, (tx_desc_phys >> 32) as u32);
        self.write_reg(REG_TDLEN, self.tx_ring.table_bytes());

        self.write_reg(REG_TDH, 0);
        self.write_reg(REG_TDT, 0);

        self.write_reg(
            REG_TCTL,
            TCTL_EN
                | TCTL_PSP
                | (TCTL_CT_FULL_DUPLEX << TCTL_CT_SHIFT)
                | (TCTL_COLD_FULL_DUPLEX << TCTL_COLD_SHIFT),
        );
        self.write_reg(
            REG_TIPG,
            TIPG_IPGT | (TIPG_IPGR1 << TIPG_IPGR1_SHIFT) | (TIPG_IPGR2 << TIPG_IPGR2_SHIFT),
        );

        debug!(
            "E1000: TX ring of {} at {:#x}",
            self.tx_ring.len(),
            tx_desc_phys
        );
    }

    /// Program the station address, multicast filter and interrupt mask
    fn init_mac(&mut self, configured: Option<[u8; 6]>) {
        self.mac_address = configured
            .or_else(|| self.read_mac_address())
            .unwrap_or(DEFAULT_MAC);

        let mac = self.mac_address;
        let ral = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);
        let rah = u32::from_le_bytes([mac[4], mac[5], 0, 0]) | RAH_AV;
        self.write_reg(REG_RAL, ral);
        self.write_reg(REG_RAH, rah);

        for i in 0..MTA_ENTRIES {
            self.write_reg(REG_MTA + i * 4, 0);
        }

        // Consumed by polling; the sources are armed for an interrupt layer
        self.write_reg(REG_IMS, IMS_LSC | IMS_RXSEQ | IMS_RXDMT0 | IMS_RXO | IMS_RXT0);
    }

    /// MAC address the NIC loaded from its EEPROM, if any
    fn read_mac_address(&self) -> Option<[u8; 6]> {
        let ral = self.read_reg(REG_RAL).to_le_bytes();
        let rah = self.read_reg(REG_RAH).to_le_bytes();
        let mac = [ral[0], ral[1], ral[2], ral[3], rah[0], rah[1]];

        if mac == [0; 6] || mac == [0xff; 6] {
            None
        } else {
            Some(mac)
        }
    }

    /// Program the receive ring and enable the receiver
    fn init_rx(&mut self) {
        let rx_desc_phys = self.rx_ring.descriptor_phys_addr();
        self.write_reg(REG_RDBAL, rx_desc_phys as u32);
        self.write_reg(REG_RDBAH, (rx_desc_phys >> 32) as u32);
        self.write_reg(REG_RDLEN, self.rx_ring.table_bytes());

        // Every slot but the one at the tail belongs to hardware
        self.write_reg(REG_RDH, 0);
        self.write_reg(REG_RDT, (self.rx_ring.len() - 1) as u32);

        self.write_reg(
            REG_RCTL,
            RCTL_EN
                | RCTL_LPE
                | RCTL_LBM_NONE
                | RCTL_RDMTS_HALF
                | RCTL_MO_0
                | RCTL_BAM
                | RCTL_BSIZE_2048
                | RCTL_SECRC,
        );

        debug!(
            "E1000: RX ring of {} at {:#x}",
            self.rx_ring.len(),
            rx_desc_phys
        );
    }

    /// Get MAC address
    pub fn mac_address(&self) -> [u8; 6] {
        self.mac_address
    }

    /// Current transmit tail, reduced into the ring
    fn tx_tail(&self) -> usize {
        self.read_reg(REG_TDT) as usize % self.tx_ring.len()
    }

    /// Slot after the current receive tail
    fn rx_next(&self) -> usize {
        let tail = self.read_reg(REG_RDT) as usize % self.rx_ring.len();
        self.rx_ring.next_index(tail)
    }

    /// Queue a frame for transmission
    ///
    /// Frames longer than one segment are split across consecutive slots,
    /// with end-of-packet set only on the last. The tail register is written
    /// once, after every segment is in place.
    pub fn transmit(&mut self, data: &[u8]) -> Result<(), TxError> {
        let tail = self.tx_tail();

        match self.tx_ring.enqueue(tail, data) {
            Ok(new_tail) => {
                if new_tail != tail {
                    // Descriptors must be visible before hardware may fetch them
                    fence(Ordering::Release);
                    self.write_reg(REG_TDT, new_tail as u32);

                    self.stats.tx_packets += 1;
                    self.stats.tx_bytes += data.len() as u64;
                }
                Ok(())
            }
            Err(TxError::RingFull) => {
                self.stats.tx_ring_full += 1;
                trace!("E1000: TX ring full at slot {}", tail);
                Err(TxError::RingFull)
            }
            Err(e) => {
                warn!("E1000: {}", e);
                Err(e)
            }
        }
    }

    /// Whether a frame of `len` bytes would be accepted right now
    pub fn can_transmit(&self, len: usize) -> bool {
        self.tx_ring
            .has_room(self.tx_tail(), len.div_ceil(MAX_PKT_SIZE))
    }

    /// Receive one frame into `buf`, returning its length
    ///
    /// A frame larger than `buf` is still consumed; the bytes that fit are
    /// kept and the loss is reported as [`RxError::Truncated`].
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, RxError> {
        let start = self.rx_next();
        let Some((count, _)) = self.rx_ring.pending_frame(start) else {
            return Err(RxError::RingEmpty);
        };

        // Payload reads must not be hoisted above the done-bit checks
        fence(Ordering::Acquire);
        let consumed = self.rx_ring.dequeue(start, count, buf);

        // Cleared descriptors must be visible before the slots are republished
        fence(Ordering::Release);
        self.write_reg(REG_RDT, consumed.last as u32);

        self.stats.rx_packets += 1;
        self.stats.rx_bytes += consumed.copied as u64;

        if consumed.copied < consumed.frame_len {
            self.stats.rx_truncated += 1;
            let dropped = consumed.frame_len - consumed.copied;
            warn!("E1000: RX frame truncated, {} bytes dropped", dropped);
            return Err(RxError::Truncated {
                copied: consumed.copied,
                dropped,
            });
        }
        Ok(consumed.copied)
    }

    /// Receive one frame into a freshly allocated buffer of exactly its size
    pub fn receive_vec(&mut self) -> Result<Vec<u8>, RxError> {
        let Some((_, frame_len)) = self.rx_ring.pending_frame(self.rx_next()) else {
            return Err(RxError::RingEmpty);
        };
        let mut data = vec![0u8; frame_len];
        let len = self.receive(&mut data)?;
        data.truncate(len);
        Ok(data)
    }

    /// Check if there's a frame ready to receive
    pub fn has_packet(&self) -> bool {
        self.rx_ring.pending_frame(self.rx_next()).is_some()
    }

    /// Check link status
    pub fn link_up(&self) -> bool {
        self.read_reg(REG_STATUS) & STATUS_LU != 0
    }

    /// Get device statistics
    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn tx_ring(&self) -> &TxRing {
        &self.tx_ring
    }

    pub fn rx_ring(&self) -> &RxRing {
        &self.rx_ring
    }

    #[cfg(test)]
    pub(crate) fn parts_mut(&mut self) -> (&mut R, &mut TxRing, &mut RxRing) {
        (&mut self.regs, &mut self.tx_ring, &mut self.rx_ring)
    }
}

impl<R: RegisterWindow> Drop for E1000<R> {
    /// Stop both DMA engines before the rings they point at are freed
    fn drop(&mut self) {
        self.write_reg(REG_RCTL, 0);
        self.write_reg(REG_TCTL, 0);
        debug!("E1000: receiver and transmitter disabled");
    }
}
