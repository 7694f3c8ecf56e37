//! meshpool crate.
//!
//! Packs many small meshes into one shared GPU vertex buffer and draws them
//! through per-model index buffers and base vertices.

pub mod device;
pub mod logging;
pub mod pool;

pub use pool::{ModelHandle, ModelPool, PoolConfig};
