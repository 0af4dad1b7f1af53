//! E1000 Ring Buffer Management
//!
//! Each ring owns a page aligned descriptor table and one DMA buffer per
//! slot. A slot belongs either to software or to hardware: software hands
//! slots over by moving the tail register (done by the caller), hardware
//! hands them back by setting the descriptor done bit.

use super::descriptors::{RxDescriptor, TxCommand, TxDescriptor};
use super::error::TxError;
use super::{MAX_BUF_SIZE, MAX_PKT_SIZE};
use crate::memory::dma::{AddressTranslator, DmaBuffer, DmaError, DmaPool};
use core::mem::size_of;
use core::ptr::{read_volatile, write_volatile};

/// Transmit ring buffer
pub struct TxRing {
    /// Descriptor table
    descriptors: DmaBuffer,
    /// Packet buffers, one per descriptor
    buffers: DmaPool,
    len: usize,
}

/// Receive ring buffer
pub struct RxRing {
    /// Descriptor table
    descriptors: DmaBuffer,
    /// Packet buffers, permanently bound to their descriptors
    buffers: DmaPool,
    len: usize,
}

/// Outcome of copying one frame out of the receive ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumed {
    /// Bytes written into the destination
    pub copied: usize,
    /// Bytes the hardware delivered for the frame
    pub frame_len: usize,
    /// Index of the frame's end-of-packet slot
    pub last: usize,
}

impl TxRing {
    pub fn new<T: AddressTranslator + ?Sized>(len: usize, translator: &T) -> Result<Self, DmaError> {
        let descriptors = DmaBuffer::alloc(len * size_of::<TxDescriptor>(), translator)?;
        let buffers = DmaPool::new(len, MAX_PKT_SIZE, translator)?;

        let mut ring = Self {
            descriptors,
            buffers,
            len,
        };
        for i in 0..len {
            let desc = TxDescriptor {
                buffer_addr: ring.buffers.device_addr(i),
                ..TxDescriptor::new()
            };
            ring.write_descriptor(i, desc);
        }
        Ok(ring)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn descriptor_phys_addr(&self) -> u64 {
        self.descriptors.device_addr()
    }

    /// Descriptor table size in bytes, as programmed into TDLEN
    pub fn table_bytes(&self) -> u32 {
        (self.len * size_of::<TxDescriptor>()) as u32
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.len
    }

    /// Longest frame the ring can ever queue in one call
    pub fn max_frame_len(&self) -> usize {
        (self.len - 1) * MAX_PKT_SIZE
    }

    fn descriptor_ptr(&self, index: usize) -> *mut TxDescriptor {
        assert!(index < self.len);
        // Safety: the table holds `len` descriptors.
        unsafe { (self.descriptors.as_ptr() as *mut TxDescriptor).add(index) }
    }

    pub fn descriptor(&self, index: usize) -> TxDescriptor {
        // Safety: in bounds, and the table is aligned for descriptors.
        unsafe { read_volatile(self.descriptor_ptr(index)) }
    }

    pub(crate) fn write_descriptor(&mut self, index: usize, desc: TxDescriptor) {
        // Safety: as in `descriptor`.
        unsafe { write_volatile(self.descriptor_ptr(index), desc) }
    }

    /// Whether `segments` slots starting at `tail` can be armed
    ///
    /// The slot the new tail will point at must not be in flight either,
    /// otherwise the tail would wrap onto the hardware head.
    pub fn has_room(&self, tail: usize, segments: usize) -> bool {
        if segments >= self.len {
            return false;
        }
        let mut index = tail;
        for _ in 0..=segments {
            if self.descriptor(index).in_flight() {
                return false;
            }
            index = self.next_index(index);
        }
        true
    }

    /// Copy `data` into consecutive slots starting at `tail`
    ///
    /// Returns the new tail. Nothing is written unless every segment fits.
    pub fn enqueue(&mut self, tail: usize, data: &[u8]) -> Result<usize, TxError> {
        if data.is_empty() {
            return Ok(tail);
        }
        let segments = data.len().div_ceil(MAX_PKT_SIZE);
        if segments >= self.len {
            return Err(TxError::FrameTooLarge {
                len: data.len(),
                max: self.max_frame_len(),
            });
        }
        if !self.has_room(tail, segments) {
            return Err(TxError::RingFull);
        }

        let mut index = tail;
        let mut chunks = data.chunks(MAX_PKT_SIZE).peekable();
        while let Some(chunk) = chunks.next() {
            self.buffers.slot_mut(index)[..chunk.len()].copy_from_slice(chunk);

            let mut cmd = TxCommand::RS | TxCommand::IFCS;
            if chunks.peek().is_none() {
                cmd |= TxCommand::EOP;
            }
            let desc = TxDescriptor::segment(self.buffers.device_addr(index), chunk.len() as u16, cmd);
            self.write_descriptor(index, desc);

            index = self.next_index(index);
        }
        Ok(index)
    }
}

impl RxRing {
    pub fn new<T: AddressTranslator + ?Sized>(len: usize, translator: &T) -> Result<Self, DmaError> {
        let descriptors = DmaBuffer::alloc(len * size_of::<RxDescriptor>(), translator)?;
        let buffers = DmaPool::new(len, MAX_BUF_SIZE, translator)?;

        let mut ring = Self {
            descriptors,
            buffers,
            len,
        };
        for i in 0..len {
            ring.write_descriptor(i, RxDescriptor::empty(ring.buffers.device_addr(i)));
        }
        Ok(ring)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn descriptor_phys_addr(&self) -> u64 {
        self.descriptors.device_addr()
    }

    /// Descriptor table size in bytes, as programmed into RDLEN
    pub fn table_bytes(&self) -> u32 {
        (self.len * size_of::<RxDescriptor>()) as u32
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.len
    }

    fn descriptor_ptr(&self, index: usize) -> *mut RxDescriptor {
        assert!(index < self.len);
        // Safety: the table holds `len` descriptors.
        unsafe { (self.descriptors.as_ptr() as *mut RxDescriptor).add(index) }
    }

    pub fn descriptor(&self, index: usize) -> RxDescriptor {
        // Safety: in bounds, and the table is aligned for descriptors.
        unsafe { read_volatile(self.descriptor_ptr(index)) }
    }

    pub(crate) fn write_descriptor(&mut self, index: usize, desc: RxDescriptor) {
        // Safety: as in `descriptor`.
        unsafe { write_volatile(self.descriptor_ptr(index), desc) }
    }

    /// Find a complete frame starting at `start`
    ///
    /// Returns the number of slots it spans and its total length, or `None`
    /// when `start` is not done or the frame is still being written.
    pub fn pending_frame(&self, start: usize) -> Option<(usize, usize)> {
        let mut index = start;
        let mut frame_len = 0;
        for count in 1..=self.len {
            let desc = self.descriptor(index);
            if !desc.is_done() {
                return None;
            }
            frame_len += desc.length as usize;
            if desc.is_end_of_packet() {
                return Some((count, frame_len));
            }
            index = self.next_index(index);
        }
        None
    }

    /// Copy a frame of `count` slots into `dest` and return the slots to hardware
    ///
    /// Bytes beyond `dest.len()` are dropped. Each consumed descriptor is reset
    /// in place; its buffer binding never changes.
    pub fn dequeue(&mut self, start: usize, count: usize, dest: &mut [u8]) -> Consumed {
        let mut index = start;
        let mut copied = 0;
        let mut frame_len = 0;
        let mut last = start;

        for _ in 0..count {
            let desc = self.descriptor(index);
            let length = (desc.length as usize).min(self.buffers.slot_size());
            frame_len += length;

            let n = length.min(dest.len() - copied);
            dest[copied..copied + n].copy_from_slice(&self.buffers.slot(index)[..n]);
            copied += n;

            self.write_descriptor(index, RxDescriptor::empty(desc.buffer_addr));
            last = index;
            index = self.next_index(index);
        }

        Consumed {
            copied,
            frame_len,
            last,
        }
    }
}
