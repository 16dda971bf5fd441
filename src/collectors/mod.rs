//! Host data sources

pub mod cpu;
pub mod gpu;
