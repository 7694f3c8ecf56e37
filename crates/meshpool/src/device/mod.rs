//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - submitting recorded command encoders

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;
