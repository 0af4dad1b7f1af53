//! E1000 TX/RX Descriptors (legacy 16-byte format)

use bitflags::bitflags;

bitflags! {
    /// Transmit descriptor command bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxCommand: u8 {
        /// End Of Packet: last segment of a frame
        const EOP = 1 << 0;
        /// Insert FCS: hardware appends the Ethernet CRC
        const IFCS = 1 << 1;
        /// Report Status: hardware sets DD once the segment is sent
        const RS = 1 << 3;
    }
}

bitflags! {
    /// Transmit descriptor status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxStatus: u8 {
        /// Descriptor Done
        const DD = 1 << 0;
    }
}

bitflags! {
    /// Receive descriptor status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxStatus: u8 {
        /// Descriptor Done
        const DD = 1 << 0;
        /// End Of Packet
        const EOP = 1 << 1;
    }
}

/// Transmit descriptor (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxDescriptor {
    pub buffer_addr: u64,
    pub length: u16,
    pub cso: u8,
    pub cmd: u8,
    pub status: u8,
    pub css: u8,
    pub special: u16,
}

/// Receive descriptor (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxDescriptor {
    pub buffer_addr: u64,
    pub length: u16,
    pub checksum: u16,
    pub status: u8,
    pub errors: u8,
    pub special: u16,
}

const _: () = assert!(core::mem::size_of::<TxDescriptor>() == 16);
const _: () = assert!(core::mem::size_of::<RxDescriptor>() == 16);

impl TxDescriptor {
    pub const fn new() -> Self {
        Self {
            buffer_addr: 0,
            length: 0,
            cso: 0,
            cmd: 0,
            status: 0,
            css: 0,
            special: 0,
        }
    }

    /// A freshly armed segment: status and checksum fields cleared
    pub const fn segment(buffer_addr: u64, length: u16, cmd: TxCommand) -> Self {
        Self {
            buffer_addr,
            length,
            cso: 0,
            cmd: cmd.bits(),
            status: 0,
            css: 0,
            special: 0,
        }
    }

    pub fn command(&self) -> TxCommand {
        TxCommand::from_bits_truncate(self.cmd)
    }

    pub fn status(&self) -> TxStatus {
        TxStatus::from_bits_truncate(self.status)
    }

    /// Handed to hardware with a status report requested and not yet done
    pub fn in_flight(&self) -> bool {
        self.command().contains(TxCommand::RS) && !self.status().contains(TxStatus::DD)
    }
}

impl RxDescriptor {
    pub const fn new() -> Self {
        Self {
            buffer_addr: 0,
            length: 0,
            checksum: 0,
            status: 0,
            errors: 0,
            special: 0,
        }
    }

    /// An empty slot bound to `buffer_addr`, owned by hardware
    pub const fn empty(buffer_addr: u64) -> Self {
        Self {
            buffer_addr,
            ..Self::new()
        }
    }

    pub fn status(&self) -> RxStatus {
        RxStatus::from_bits_truncate(self.status)
    }

    pub fn is_done(&self) -> bool {
        self.status().contains(RxStatus::DD)
    }

    pub fn is_end_of_packet(&self) -> bool {
        self.status().contains(RxStatus::EOP)
    }
}
