//! Host capability probing for ModelPort
//!
//! This crate reads hardware facts (GPU, RAM, CPU) into an immutable
//! `HardwareSpecs` snapshot consumed by the recommendation engine.

pub mod probe;
pub mod specs;

pub use probe::HardwareProbe;
pub use specs::{CpuSpecs, GpuSpecs, HardwareSpecs, RamSpecs};
