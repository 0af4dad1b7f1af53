//! DMA memory management for device drivers
//!
//! Buffers handed to a device come from the global allocator, page aligned
//! and zeroed. Their device-visible address is obtained through an injected
//! [`AddressTranslator`] and stored alongside the CPU pointer, so callers
//! never derive DMA addresses themselves.

use alloc::alloc::{alloc_zeroed, dealloc};
use alloc::vec::Vec;
use core::alloc::Layout;
use core::ptr::NonNull;
use core::slice;
use thiserror::Error;

/// Alignment of every DMA allocation
pub const DMA_ALIGN: usize = 4096;

/// Buffers in a pool are spaced on this boundary
const SLOT_ALIGN: usize = 16;

/// DMA allocation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DmaError {
    #[error("invalid DMA layout: {size} bytes")]
    InvalidLayout { size: usize },
    #[error("out of memory allocating {size} bytes of DMA memory")]
    OutOfMemory { size: usize },
}

/// Translates a CPU pointer into the address a device uses to reach it
pub trait AddressTranslator {
    fn translate_to_device_address(&self, virt: *const u8) -> u64;
}

impl<T: AddressTranslator + ?Sized> AddressTranslator for &T {
    fn translate_to_device_address(&self, virt: *const u8) -> u64 {
        (**self).translate_to_device_address(virt)
    }
}

/// Higher-half direct map: physical = virtual - offset
///
/// Only valid for pointers inside the direct map; addresses in the kernel
/// image or other mappings translate to garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HhdmTranslator {
    offset: u64,
}

impl HhdmTranslator {
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Convert physical address to virtual address
    pub fn phys_to_virt(&self, phys: u64) -> *mut u8 {
        phys.wrapping_add(self.offset) as *mut u8
    }
}

impl AddressTranslator for HhdmTranslator {
    fn translate_to_device_address(&self, virt: *const u8) -> u64 {
        (virt as u64).wrapping_sub(self.offset)
    }
}

/// Device addresses equal CPU addresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityTranslator;

impl AddressTranslator for IdentityTranslator {
    fn translate_to_device_address(&self, virt: *const u8) -> u64 {
        virt as u64
    }
}

/// A DMA-capable buffer
pub struct DmaBuffer {
    virt: NonNull<u8>,
    device_addr: u64,
    layout: Layout,
}

// Safety: the buffer is uniquely owned; sharing it with the device is
// governed by the descriptor ownership protocol, not by the CPU side.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    /// Allocate a zeroed, page aligned buffer of `size` bytes
    pub fn alloc<T: AddressTranslator + ?Sized>(
        size: usize,
        translator: &T,
    ) -> Result<Self, DmaError> {
        if size == 0 {
            return Err(DmaError::InvalidLayout { size });
        }
        let layout =
            Layout::from_size_align(size, DMA_ALIGN).map_err(|_| DmaError::InvalidLayout { size })?;

        // Safety: layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let virt = NonNull::new(ptr).ok_or(DmaError::OutOfMemory { size })?;
        let device_addr = translator.translate_to_device_address(virt.as_ptr());

        Ok(Self {
            virt,
            device_addr,
            layout,
        })
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address the device uses for the first byte
    pub fn device_addr(&self) -> u64 {
        self.device_addr
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.virt.as_ptr()
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        // Safety: allocated in `alloc` with exactly this layout.
        unsafe { dealloc(self.virt.as_ptr(), self.layout) }
    }
}

/// Location of one pool slot
#[derive(Debug, Clone, Copy)]
struct Slot {
    virt: NonNull<u8>,
    device_addr: u64,
}

/// Fixed-size buffers, one per ring slot
///
/// Slots are packed into page sized allocations so each slot is physically
/// contiguous even when consecutive pages are not.
pub struct DmaPool {
    _pages: Vec<DmaBuffer>,
    slots: Vec<Slot>,
    slot_size: usize,
}

// Safety: the slot pointers refer into `_pages`, which the pool owns.
unsafe impl Send for DmaPool {}

impl DmaPool {
    /// Allocate `count` zeroed buffers of `slot_size` bytes each
    pub fn new<T: AddressTranslator + ?Sized>(
        count: usize,
        slot_size: usize,
        translator: &T,
    ) -> Result<Self, DmaError> {
        if slot_size == 0 || slot_size > DMA_ALIGN {
            return Err(DmaError::InvalidLayout { size: slot_size });
        }

        let stride = slot_size.next_multiple_of(SLOT_ALIGN);
        let per_page = DMA_ALIGN / stride;

        let mut pages = Vec::with_capacity(count.div_ceil(per_page));
        let mut slots = Vec::with_capacity(count);

        for i in 0..count {
            // Allocate a new page when the current one is full
            if i % per_page == 0 {
                pages.push(DmaBuffer::alloc(DMA_ALIGN, translator)?);
            }
            let Some(page) = pages.last() else {
                return Err(DmaError::OutOfMemory { size: DMA_ALIGN });
            };

            let offset = (i % per_page) * stride;
            // Safety: offset + slot_size stays within the page.
            let ptr = unsafe { page.as_ptr().add(offset) };
            let virt = NonNull::new(ptr).ok_or(DmaError::OutOfMemory { size: slot_size })?;
            slots.push(Slot {
                virt,
                device_addr: translator.translate_to_device_address(ptr),
            });
        }

        Ok(Self {
            _pages: pages,
            slots,
            slot_size,
        })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn device_addr(&self, index: usize) -> u64 {
        self.slots[index].device_addr
    }

    pub fn slot(&self, index: usize) -> &[u8] {
        let slot = &self.slots[index];
        // Safety: the slot lies inside a live page owned by the pool.
        unsafe { slice::from_raw_parts(slot.virt.as_ptr(), self.slot_size) }
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut [u8] {
        let slot = &self.slots[index];
        // Safety: as above, and `&mut self` makes the borrow unique.
        unsafe { slice::from_raw_parts_mut(slot.virt.as_ptr(), self.slot_size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hhdm_translation_round_trips() {
        let hhdm = HhdmTranslator::new(0xffff_8000_0000_0000);
        let virt = 0xffff_8000_0012_3000u64 as *const u8;
        let phys = hhdm.translate_to_device_address(virt);
        assert_eq!(phys, 0x12_3000);
        assert_eq!(hhdm.phys_to_virt(phys) as u64, virt as u64);
    }

    #[test]
    fn buffer_is_page_aligned_and_zeroed() {
        let buffer = DmaBuffer::alloc(100, &IdentityTranslator).unwrap();
        assert_eq!(buffer.as_ptr() as usize % DMA_ALIGN, 0);
        assert_eq!(buffer.device_addr(), buffer.as_ptr() as u64);
        assert_eq!(buffer.len(), 100);
        let bytes = unsafe { slice::from_raw_parts(buffer.as_ptr(), buffer.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_sized_buffer_is_rejected() {
        assert_eq!(
            DmaBuffer::alloc(0, &IdentityTranslator).err(),
            Some(DmaError::InvalidLayout { size: 0 })
        );
    }

    #[test]
    fn pool_packs_slots_into_pages() {
        let pool = DmaPool::new(5, 2048, &IdentityTranslator).unwrap();
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.device_addr(1), pool.device_addr(0) + 2048);
        assert_eq!(pool.device_addr(2) % DMA_ALIGN as u64, 0);
        assert_eq!(pool.slot(4).len(), 2048);
    }

    #[test]
    fn pool_slots_are_16_byte_spaced() {
        let pool = DmaPool::new(3, 1518, &IdentityTranslator).unwrap();
        assert_eq!(pool.device_addr(1) - pool.device_addr(0), 1520);
        assert_eq!(pool.slot(0).len(), 1518);
    }

    #[test]
    fn pool_slots_do_not_overlap() {
        let mut pool = DmaPool::new(4, 1518, &IdentityTranslator).unwrap();
        for i in 0..4 {
            pool.slot_mut(i).fill(i as u8 + 1);
        }
        for i in 0..4 {
            assert!(pool.slot(i).iter().all(|&b| b == i as u8 + 1));
        }
    }

    #[test]
    fn oversized_slot_is_rejected() {
        assert!(DmaPool::new(1, DMA_ALIGN + 1, &IdentityTranslator).is_err());
    }
}
