//! Register window access and the bus collaborator interface

use super::error::AttachError;
use core::ptr::{NonNull, read_volatile, write_volatile};

/// A block of 32-bit device registers addressed by byte offset
pub trait RegisterWindow {
    fn read(&self, offset: u32) -> u32;
    fn write(&mut self, offset: u32, value: u32);
    /// Window size in bytes
    fn size(&self) -> usize;
}

/// Physical location of a device's register BAR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioRegion {
    pub base: u64,
    pub size: usize,
}

/// The bus side of a NIC: activation and register mapping
pub trait DeviceHandle {
    type Registers: RegisterWindow;

    /// Enable memory decoding and bus mastering, returning the register BAR
    fn enable_device(&mut self) -> Result<MmioRegion, AttachError>;

    /// Map the register BAR into the CPU's address space
    fn map_registers(&mut self, region: MmioRegion) -> Result<Self::Registers, AttachError>;
}

/// Memory-mapped register window
#[derive(Debug)]
pub struct MmioWindow {
    base: NonNull<u8>,
    size: usize,
}

// Safety: registers are only reached through `&self`/`&mut self`.
unsafe impl Send for MmioWindow {}

impl MmioWindow {
    /// Wrap an already mapped register region
    ///
    /// # Safety
    ///
    /// `base` must point to an uncached mapping of at least `size` bytes of
    /// device registers that stays mapped for the lifetime of the window.
    pub unsafe fn new(base: *mut u8, size: usize) -> Option<Self> {
        if base as usize % 4 != 0 {
            return None;
        }
        NonNull::new(base).map(|base| Self { base, size })
    }

    fn register(&self, offset: u32) -> *mut u32 {
        debug_assert!(offset % 4 == 0 && offset as usize + 4 <= self.size);
        // Safety: the offset lies within the mapped window.
        unsafe { self.base.as_ptr().add(offset as usize) as *mut u32 }
    }
}

impl RegisterWindow for MmioWindow {
    fn read(&self, offset: u32) -> u32 {
        // Safety: see `MmioWindow::new`.
        unsafe { read_volatile(self.register(offset)) }
    }

    fn write(&mut self, offset: u32, value: u32) {
        // Safety: see `MmioWindow::new`.
        unsafe { write_volatile(self.register(offset), value) }
    }

    fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn mmio_window_reads_back_writes() {
        let mut backing = vec![0u32; 64];
        let mut window = unsafe { MmioWindow::new(backing.as_mut_ptr() as *mut u8, 256) }.unwrap();
        window.write(0x10, 0xdead_beef);
        assert_eq!(window.read(0x10), 0xdead_beef);
        assert_eq!(window.read(0x14), 0);
        assert_eq!(window.size(), 256);
        drop(window);
        assert_eq!(backing[4], 0xdead_beef);
    }

    #[test]
    fn mmio_window_rejects_null_and_misaligned() {
        assert!(unsafe { MmioWindow::new(core::ptr::null_mut(), 16) }.is_none());
        let mut backing = [0u32; 4];
        let misaligned = unsafe { (backing.as_mut_ptr() as *mut u8).add(1) };
        assert!(unsafe { MmioWindow::new(misaligned, 8) }.is_none());
    }
}
