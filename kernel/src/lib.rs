//! Polled e1000 network driver
//!
//! The driver core in [`drivers::e1000`] only needs a register window and an
//! address translator, so it runs against real hardware or a test double
//! alike. On x86_64 [`init_network`] wires it to PCI, the HHDM and the serial
//! logger.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod drivers;
pub mod memory;
pub mod net;

pub use drivers::e1000::{AttachError, E1000, E1000Config, RxError, TxError};

#[cfg(target_arch = "x86_64")]
pub use x86_64_init::{NIC, init_network};

#[cfg(target_arch = "x86_64")]
mod x86_64_init {
    use crate::drivers::e1000::{self, AttachError, E1000, E1000Config, MmioWindow};
    use crate::drivers::pci::PciNic;
    use crate::drivers::serial;
    use crate::memory::dma::HhdmTranslator;
    use log::{info, warn};
    use nic_boot::{BootConfig, NetConfig};
    use spin::Mutex;

    /// Global E1000 device instance
    pub static NIC: Mutex<Option<E1000<MmioWindow>>> = Mutex::new(None);

    /// Bring up logging and the first e1000 on the PCI bus
    ///
    /// `hhdm_offset` is the base of the bootloader's higher-half direct map.
    /// DMA memory comes from the global allocator and is translated by
    /// subtracting that offset, so the heap must be served from the direct
    /// map. A heap placed in the kernel image (a static array) is not, and
    /// the NIC would be handed wrong physical addresses.
    ///
    /// On success the device is stored in [`NIC`]. A device attached by an
    /// earlier call is shut down first.
    pub fn init_network(cmdline: &str, hhdm_offset: u64) -> Result<[u8; 6], AttachError> {
        // Same hardware: the old handle must stop it before it is reprogrammed
        drop(NIC.lock().take());

        let boot = BootConfig::from_cmdline(cmdline);
        if serial::init_logging(boot.log_level).is_err() {
            warn!("NET: logger already installed");
        }

        let mut net = boot.net;
        if let Err(e) = net.validate() {
            warn!("NET: {}, using default ring lengths", e);
            net = NetConfig {
                mac: net.mac,
                ..NetConfig::default()
            };
        }

        let hhdm = HhdmTranslator::new(hhdm_offset);
        let mut handle = PciNic::probe(hhdm)?;
        let nic = e1000::attach(&mut handle, &hhdm, &E1000Config::from(&net))?;

        let mac = nic.mac_address();
        info!("NET: link {}", if nic.link_up() { "up" } else { "down" });
        *NIC.lock() = Some(nic);
        Ok(mac)
    }
}
