//! Networking glue above the NIC driver

pub mod device;
pub mod pump;

pub use device::{MTU, NicDevice};
pub use pump::{Outbound, PacketDispatch, pump_inbound, pump_outbound};
