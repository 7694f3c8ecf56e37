//! Seams between the pool and the graphics API.

use anyhow::Result;

use super::{IndexData, IndexType, Topology};

/// Device-side storage behind a pool: one growable vertex buffer plus the
/// per-model element buffers.
///
/// The pool is the only mutator of a device. Bindings are a draw-time concern
/// and live on the [`DrawBackend`] / render pass side.
pub trait PoolDevice {
    type Elements: ElementBuffer;

    /// Current byte size of the vertex buffer.
    fn capacity(&self) -> u64;

    /// Replaces the vertex buffer's storage with `size` bytes.
    ///
    /// Previous contents are invalidated. On failure the previous storage and
    /// capacity must be left as they were.
    fn allocate(&mut self, size: u64) -> Result<()>;

    /// Commits host bytes at `offset`. Offsets and lengths are multiples of
    /// [`STRIDE_ALIGNMENT`](super::STRIDE_ALIGNMENT).
    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;

    /// Creates a model's private index buffer.
    fn create_elements(&mut self, indices: IndexData<'_>) -> Result<Self::Elements>;

    /// Frees the vertex buffer. The device is unusable afterwards.
    fn release(&mut self) {}
}

/// A model's private index buffer.
pub trait ElementBuffer {
    fn element_count(&self) -> u32;
    fn index_type(&self) -> IndexType;
}

/// Parameters of one indexed, base-vertex draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawElements {
    pub topology: Topology,
    pub element_count: u32,
    pub index_type: IndexType,
    /// First index to read, in elements.
    pub index_offset: u32,
    pub instance_count: u32,
    /// Added to every index before fetching from the shared vertex buffer.
    pub base_vertex: i32,
}

/// Issues draws against element buffers of type `E`.
///
/// The shared vertex buffer is expected to be bound already.
pub trait DrawBackend<E: ?Sized> {
    fn draw_elements(&mut self, elements: &E, draw: &DrawElements);
}
