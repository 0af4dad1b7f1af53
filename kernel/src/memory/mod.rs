//! Memory management for device drivers

pub mod dma;
