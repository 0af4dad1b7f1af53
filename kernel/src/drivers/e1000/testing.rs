//! In-memory register window and a software model of the NIC's DMA engine
//!
//! The rings are allocated with the identity translator, so descriptor
//! buffer addresses are plain pointers the model can dereference.

use super::*;
use crate::memory::dma::IdentityTranslator;
use alloc::collections::BTreeMap;
use core::ptr;

/// Size of the e1000 register BAR
pub const WINDOW_SIZE: usize = 0x20000;

/// Register window backed by a map, recording every driver write
#[derive(Debug, Default)]
pub struct MockRegisters {
    values: BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
}

impl MockRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers as left by an EEPROM load of `mac`
    pub fn with_mac(mac: [u8; 6]) -> Self {
        let mut regs = Self::new();
        regs.set(REG_RAL, u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]));
        regs.set(REG_RAH, u32::from_le_bytes([mac[4], mac[5], 0, 0]));
        regs
    }

    pub fn get(&self, offset: u32) -> u32 {
        self.values.get(&offset).copied().unwrap_or(0)
    }

    /// Hardware-side update; not recorded as a driver write
    pub fn set(&mut self, offset: u32, value: u32) {
        self.values.insert(offset, value);
    }

    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    pub fn writes_to(&self, offset: u32) -> usize {
        self.writes.iter().filter(|(o, _)| *o == offset).count()
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

impl RegisterWindow for MockRegisters {
    fn read(&self, offset: u32) -> u32 {
        self.get(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.writes.push((offset, value));
        self.values.insert(offset, value);
    }

    fn size(&self) -> usize {
        WINDOW_SIZE
    }
}

/// Bus collaborator handing out a `MockRegisters` window
pub struct MockHandle {
    pub region: Option<MmioRegion>,
    pub mappable: bool,
    pub regs: Option<MockRegisters>,
}

impl Default for MockHandle {
    fn default() -> Self {
        Self {
            region: Some(MmioRegion {
                base: 0xfebc_0000,
                size: WINDOW_SIZE,
            }),
            mappable: true,
            regs: Some(MockRegisters::new()),
        }
    }
}

impl DeviceHandle for MockHandle {
    type Registers = MockRegisters;

    fn enable_device(&mut self) -> Result<MmioRegion, AttachError> {
        self.region.ok_or(AttachError::DeviceNotEnabled)
    }

    fn map_registers(&mut self, region: MmioRegion) -> Result<MockRegisters, AttachError> {
        if !self.mappable {
            return Err(AttachError::RegisterMapFailed {
                base: region.base,
                size: region.size,
            });
        }
        self.regs.take().ok_or(AttachError::RegisterMapFailed {
            base: region.base,
            size: region.size,
        })
    }
}

pub fn nic_with(config: &E1000Config) -> E1000<MockRegisters> {
    E1000::new(MockRegisters::new(), &IdentityTranslator, config).unwrap()
}

/// Attached NIC with the default 64/128 rings and no recorded writes
pub fn nic() -> E1000<MockRegisters> {
    let mut nic = nic_with(&E1000Config::default());
    nic.parts_mut().0.clear_writes();
    nic
}

/// Attached NIC with small rings and no recorded writes
pub fn small_nic(tx_ring_len: usize, rx_ring_len: usize) -> E1000<MockRegisters> {
    let mut nic = nic_with(&E1000Config {
        mac: None,
        tx_ring_len,
        rx_ring_len,
    });
    nic.parts_mut().0.clear_writes();
    nic
}

/// Transmit everything between TDH and TDT
///
/// Returns the frames put on the wire; every report-status segment gets its
/// done bit and TDH catches up with TDT.
pub fn drain_tx(nic: &mut E1000<MockRegisters>) -> Vec<Vec<u8>> {
    let (regs, tx_ring, _) = nic.parts_mut();
    let tail = regs.get(REG_TDT) as usize;
    let mut head = regs.get(REG_TDH) as usize;

    let mut frames = Vec::new();
    let mut current = Vec::new();
    while head != tail {
        let mut desc = tx_ring.descriptor(head);
        // Safety: identity-translated DMA buffer of at least `length` bytes.
        let bytes =
            unsafe { core::slice::from_raw_parts(desc.buffer_addr as *const u8, desc.length as usize) };
        current.extend_from_slice(bytes);
        if desc.command().contains(TxCommand::EOP) {
            frames.push(core::mem::take(&mut current));
        }
        if desc.command().contains(TxCommand::RS) {
            desc.status |= TxStatus::DD.bits();
            tx_ring.write_descriptor(head, desc);
        }
        head = tx_ring.next_index(head);
    }
    regs.set(REG_TDH, head as u32);
    frames
}

/// Set the done bit on a single transmit slot without moving TDH
pub fn complete_tx_slot(nic: &mut E1000<MockRegisters>, index: usize) {
    let (_, tx_ring, _) = nic.parts_mut();
    let mut desc = tx_ring.descriptor(index);
    desc.status |= TxStatus::DD.bits();
    tx_ring.write_descriptor(index, desc);
}

/// DMA `frame` into the receive ring at RDH, splitting it over 2048-byte buffers
///
/// Returns false, writing nothing, when hardware owns too few slots.
pub fn deliver_rx(nic: &mut E1000<MockRegisters>, frame: &[u8]) -> bool {
    let (regs, _, rx_ring) = nic.parts_mut();
    let len = rx_ring.len();
    let tail = regs.get(REG_RDT) as usize;
    let mut head = regs.get(REG_RDH) as usize;

    let fragments = frame.chunks(MAX_BUF_SIZE).count().max(1);
    let owned = (tail + len - head) % len;
    if fragments > owned {
        return false;
    }

    let mut chunks = frame.chunks(MAX_BUF_SIZE).peekable();
    while let Some(chunk) = chunks.next() {
        let mut desc = rx_ring.descriptor(head);
        // Safety: identity-translated DMA buffer of MAX_BUF_SIZE bytes.
        unsafe { ptr::copy_nonoverlapping(chunk.as_ptr(), desc.buffer_addr as *mut u8, chunk.len()) };
        desc.length = chunk.len() as u16;
        desc.status = if chunks.peek().is_none() {
            (RxStatus::DD | RxStatus::EOP).bits()
        } else {
            RxStatus::DD.bits()
        };
        rx_ring.write_descriptor(head, desc);
        head = rx_ring.next_index(head);
    }
    regs.set(REG_RDH, head as u32);
    true
}

/// Deterministic frame contents
pub fn frame(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
