//! E1000 Register Definitions
//!
//! Byte offsets into the register window. Every register is a 32-bit
//! little-endian word.

// Status register
pub const REG_STATUS: u32 = 0x0008;

// Interrupt mask set
pub const REG_IMS: u32 = 0x00D0;

// Receive registers
pub const REG_RCTL: u32 = 0x0100;
pub const REG_RDBAL: u32 = 0x2800;
pub const REG_RDBAH: u32 = 0x2804;
pub const REG_RDLEN: u32 = 0x2808;
pub const REG_RDH: u32 = 0x2810;
pub const REG_RDT: u32 = 0x2818;

// Transmit registers
pub const REG_TCTL: u32 = 0x0400;
pub const REG_TIPG: u32 = 0x0410;
pub const REG_TDBAL: u32 = 0x3800;
pub const REG_TDBAH: u32 = 0x3804;
pub const REG_TDLEN: u32 = 0x3808;
pub const REG_TDH: u32 = 0x3810;
pub const REG_TDT: u32 = 0x3818;

// Multicast table array (128 entries)
pub const REG_MTA: u32 = 0x5200;
pub const MTA_ENTRIES: u32 = 128;

// MAC address registers (receive address 0)
pub const REG_RAL: u32 = 0x5400;
pub const REG_RAH: u32 = 0x5404;

/// Smallest register window that covers every register the driver touches
pub const REG_WINDOW_MIN: usize = REG_RAH as usize + 4;

// Status register bits
pub const STATUS_LU: u32 = 1 << 1; // Link Up

// Interrupt mask bits
pub const IMS_LSC: u32 = 1 << 2; // Link Status Change
pub const IMS_RXSEQ: u32 = 1 << 3; // Receive Sequence Error
pub const IMS_RXDMT0: u32 = 1 << 4; // Receive Descriptor Minimum Threshold
pub const IMS_RXO: u32 = 1 << 6; // Receiver Overrun
pub const IMS_RXT0: u32 = 1 << 7; // Receiver Timer

// Receive control bits
pub const RCTL_EN: u32 = 1 << 1; // Receiver Enable
pub const RCTL_LPE: u32 = 1 << 5; // Long Packet Enable
pub const RCTL_LBM_NONE: u32 = 0 << 6; // No Loopback
pub const RCTL_RDMTS_HALF: u32 = 0 << 8; // Free Buffer Threshold 1/2
pub const RCTL_MO_0: u32 = 0 << 12; // Multicast Offset bits 47:36
pub const RCTL_BAM: u32 = 1 << 15; // Broadcast Accept Mode
pub const RCTL_BSIZE_2048: u32 = 0 << 16; // Buffer Size 2048
pub const RCTL_SECRC: u32 = 1 << 26; // Strip Ethernet CRC

// Receive address high bits
pub const RAH_AV: u32 = 1 << 31; // Address Valid

// Transmit control bits
pub const TCTL_EN: u32 = 1 << 1; // Transmitter Enable
pub const TCTL_PSP: u32 = 1 << 3; // Pad Short Packets
pub const TCTL_CT_SHIFT: u32 = 4; // Collision Threshold
pub const TCTL_COLD_SHIFT: u32 = 12; // Collision Distance
pub const TCTL_CT_FULL_DUPLEX: u32 = 0x10;
pub const TCTL_COLD_FULL_DUPLEX: u32 = 0x40;

// Transmit inter-packet gap (IEEE 802.3 values)
pub const TIPG_IPGT: u32 = 10;
pub const TIPG_IPGR1_SHIFT: u32 = 10;
pub const TIPG_IPGR1: u32 = 8;
pub const TIPG_IPGR2_SHIFT: u32 = 20;
pub const TIPG_IPGR2: u32 = 6;
