//! Shared vertex-buffer pool.
//!
//! A [`ModelPool`] packs the vertices of many independently sized models back to
//! back in one growable device buffer. Each model keeps its own element buffer
//! and draws through a base vertex, so a whole scene binds one vertex buffer.
//!
//! Mutation is deferred: `alloc`/`delete` are bookkeeping, `flush` compacts,
//! grows and uploads. Only models added or moved since the previous flush are
//! rewritten, unless the buffer had to grow.
//!
//! Devices:
//! - [`GpuPoolDevice`]: wgpu vertex buffer + index buffers
//! - [`HostPoolDevice`]: in-memory mirror for headless use and tests

mod arena;
mod backend;
mod config;
mod error;
mod format;
mod gpu;
mod handle;
mod host;
mod mesh;
mod source;
mod view;

pub use arena::{FlushReport, ModelPool, Upload};
pub use backend::{DrawBackend, DrawElements, ElementBuffer, PoolDevice};
pub use config::PoolConfig;
pub use error::PoolError;
pub use format::{STRIDE_ALIGNMENT, VertexFormat};
pub use gpu::{GpuElementBuffer, GpuPoolDevice};
pub use handle::{ModelHandle, ModelState, PooledModel, UploadCallback, UploadedModel};
pub use host::{DrawRecorder, HostElements, HostPoolDevice};
pub use mesh::{Indices, Mesh};
pub use source::{IndexData, IndexType, ModelSource, Topology};
pub use view::MappedView;
