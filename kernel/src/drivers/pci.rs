//! PCI bus enumeration

use crate::drivers::e1000::{AttachError, DeviceHandle, MmioRegion, MmioWindow};
use crate::memory::dma::HhdmTranslator;
use alloc::vec::Vec;
use log::{debug, info, warn};
use x86_64::instructions::port::Port;

const PCI_CONFIG_ADDRESS: u16 = 0xCF8;
const PCI_CONFIG_DATA: u16 = 0xCFC;

// Configuration space offsets
const PCI_ID: u8 = 0x00;
const PCI_COMMAND: u8 = 0x04;
const PCI_CLASS: u8 = 0x08;
const PCI_HEADER: u8 = 0x0C;
const PCI_BAR0: u8 = 0x10;
const PCI_BAR1: u8 = 0x14;
const PCI_INTERRUPT: u8 = 0x3C;

// Command register bits
const COMMAND_MEMORY_SPACE: u32 = 1 << 1;
const COMMAND_BUS_MASTER: u32 = 1 << 2;

// BAR type bits
const BAR_IO: u32 = 1 << 0;
const BAR_TYPE_MASK: u32 = 0b110;
const BAR_TYPE_64: u32 = 0b100;
const BAR_MEMORY_MASK: u32 = 0xFFFF_FFF0;

/// Intel E1000 vendor and device IDs
pub const INTEL_VENDOR_ID: u16 = 0x8086;
pub const E1000_DEVICE_ID: u16 = 0x100E;

/// Register window size assumed when the BAR cannot be sized
pub const E1000_BAR_SIZE: usize = 0x20000;

/// PCI device information
#[derive(Debug, Clone, Copy)]
pub struct PciDevice {
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class_code: u8,
    pub subclass: u8,
    pub bar0: u32,
    pub bar1: u32,
    pub interrupt_line: u8,
}

impl PciDevice {
    /// Read a 32-bit value from PCI configuration space
    pub fn read_config(&self, offset: u8) -> u32 {
        pci_read(self.bus, self.slot, self.function, offset)
    }

    /// Write a 32-bit value to PCI configuration space
    pub fn write_config(&self, offset: u8, value: u32) {
        pci_write(self.bus, self.slot, self.function, offset, value);
    }
}

/// Dword access to one function's configuration space
pub trait ConfigSpace {
    fn read(&self, offset: u8) -> u32;
    fn write(&self, offset: u8, value: u32);
}

impl ConfigSpace for PciDevice {
    fn read(&self, offset: u8) -> u32 {
        self.read_config(offset)
    }

    fn write(&self, offset: u8, value: u32) {
        self.write_config(offset, value);
    }
}

/// Size a memory BAR by writing all ones and reading the mask back
///
/// Memory decoding is switched off while the BAR holds the all-ones value
/// and restored afterwards.
pub fn probe_bar_size<C: ConfigSpace + ?Sized>(cfg: &C, bar: u8) -> usize {
    let command = cfg.read(PCI_COMMAND);
    cfg.write(PCI_COMMAND, command & !COMMAND_MEMORY_SPACE);

    let original = cfg.read(bar);
    cfg.write(bar, 0xFFFF_FFFF);
    let mask = cfg.read(bar);
    cfg.write(bar, original);

    cfg.write(PCI_COMMAND, command);
    memory_bar_size(mask)
}

/// Size BAR0, then turn on memory decoding and bus mastering
pub fn activate<C: ConfigSpace + ?Sized>(cfg: &C) -> Result<MmioRegion, AttachError> {
    let base = decode_memory_bar(cfg.read(PCI_BAR0), cfg.read(PCI_BAR1))
        .ok_or(AttachError::DeviceNotEnabled)?;
    let size = match probe_bar_size(cfg, PCI_BAR0) {
        0 => {
            warn!("PCI: BAR0 did not size, assuming {:#x}", E1000_BAR_SIZE);
            E1000_BAR_SIZE
        }
        size => size,
    };

    let wanted = COMMAND_MEMORY_SPACE | COMMAND_BUS_MASTER;
    let command = cfg.read(PCI_COMMAND);
    cfg.write(PCI_COMMAND, command | wanted);
    if cfg.read(PCI_COMMAND) & wanted != wanted {
        return Err(AttachError::DeviceNotEnabled);
    }

    debug!("PCI: BAR0 {:#x} size {:#x}", base, size);
    Ok(MmioRegion { base, size })
}

/// CONFIG_ADDRESS value selecting one dword of configuration space
pub fn config_address(bus: u8, slot: u8, function: u8, offset: u8) -> u32 {
    ((bus as u32) << 16)
        | (((slot as u32) & 0x1F) << 11)
        | (((function as u32) & 0x07) << 8)
        | ((offset as u32) & 0xFC)
        | 0x8000_0000
}

/// Base address of a memory BAR, `None` for I/O or unassigned BARs
///
/// `high` is only consulted for 64-bit BARs.
pub fn decode_memory_bar(low: u32, high: u32) -> Option<u64> {
    if low & BAR_IO != 0 {
        return None;
    }
    let mut base = (low & BAR_MEMORY_MASK) as u64;
    if low & BAR_TYPE_MASK == BAR_TYPE_64 {
        base |= (high as u64) << 32;
    }
    (base != 0).then_some(base)
}

/// Region size from the value read back after writing all ones to a memory BAR
pub fn memory_bar_size(mask: u32) -> usize {
    let bits = mask & BAR_MEMORY_MASK;
    if bits == 0 {
        return 0;
    }
    (!bits).wrapping_add(1) as usize
}

/// Read from PCI configuration space
fn pci_read(bus: u8, slot: u8, function: u8, offset: u8) -> u32 {
    let address = config_address(bus, slot, function, offset);

    unsafe {
        let mut addr_port = Port::<u32>::new(PCI_CONFIG_ADDRESS);
        let mut data_port = Port::<u32>::new(PCI_CONFIG_DATA);
        addr_port.write(address);
        data_port.read()
    }
}

/// Write to PCI configuration space
fn pci_write(bus: u8, slot: u8, function: u8, offset: u8, value: u32) {
    let address = config_address(bus, slot, function, offset);

    unsafe {
        let mut addr_port = Port::<u32>::new(PCI_CONFIG_ADDRESS);
        let mut data_port = Port::<u32>::new(PCI_CONFIG_DATA);
        addr_port.write(address);
        data_port.write(value);
    }
}

/// Enumerate all PCI devices
pub fn enumerate() -> Vec<PciDevice> {
    let mut devices = Vec::new();

    for bus in 0..=255u8 {
        for slot in 0..32u8 {
            for function in 0..8u8 {
                let vendor_device = pci_read(bus, slot, function, PCI_ID);
                let vendor_id = (vendor_device & 0xFFFF) as u16;

                if vendor_id == 0xFFFF {
                    continue;
                }

                let device_id = ((vendor_device >> 16) & 0xFFFF) as u16;
                let class_info = pci_read(bus, slot, function, PCI_CLASS);
                let interrupt_info = pci_read(bus, slot, function, PCI_INTERRUPT);

                devices.push(PciDevice {
                    bus,
                    slot,
                    function,
                    vendor_id,
                    device_id,
                    class_code: ((class_info >> 24) & 0xFF) as u8,
                    subclass: ((class_info >> 16) & 0xFF) as u8,
                    bar0: pci_read(bus, slot, function, PCI_BAR0),
                    bar1: pci_read(bus, slot, function, PCI_BAR1),
                    interrupt_line: (interrupt_info & 0xFF) as u8,
                });

                // If not multi-function device, skip remaining functions
                if function == 0 {
                    let header_type = pci_read(bus, slot, 0, PCI_HEADER);
                    if (header_type >> 16) & 0x80 == 0 {
                        break;
                    }
                }
            }
        }
    }

    devices
}

/// Find a specific device by vendor and device ID
pub fn find_device(vendor_id: u16, device_id: u16) -> Option<PciDevice> {
    enumerate()
        .into_iter()
        .find(|d| d.vendor_id == vendor_id && d.device_id == device_id)
}

/// An e1000 on the PCI bus, with its registers reached through the HHDM
pub struct PciNic {
    device: PciDevice,
    hhdm: HhdmTranslator,
}

impl PciNic {
    pub fn new(device: PciDevice, hhdm: HhdmTranslator) -> Self {
        Self { device, hhdm }
    }

    /// Locate the first e1000 on the bus
    pub fn probe(hhdm: HhdmTranslator) -> Result<Self, AttachError> {
        let device =
            find_device(INTEL_VENDOR_ID, E1000_DEVICE_ID).ok_or(AttachError::DeviceNotFound)?;
        info!(
            "PCI: e1000 at {:02x}:{:02x}.{} irq {}",
            device.bus, device.slot, device.function, device.interrupt_line
        );
        Ok(Self::new(device, hhdm))
    }

    pub fn device(&self) -> &PciDevice {
        &self.device
    }
}

impl DeviceHandle for PciNic {
    type Registers = MmioWindow;

    fn enable_device(&mut self) -> Result<MmioRegion, AttachError> {
        activate(&self.device)
    }

    fn map_registers(&mut self, region: MmioRegion) -> Result<MmioWindow, AttachError> {
        let virt = self.hhdm.phys_to_virt(region.base);
        // Safety: the HHDM maps all physical memory, including device BARs,
        // for the lifetime of the kernel.
        unsafe { MmioWindow::new(virt, region.size) }.ok_or(AttachError::RegisterMapFailed {
            base: region.base,
            size: region.size,
        })
    }
}
