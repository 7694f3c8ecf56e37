use anyhow::Result;

use super::{MappedView, VertexFormat};

/// Primitive assembly for a model's elements.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl From<Topology> for wgpu::PrimitiveTopology {
    fn from(topology: Topology) -> Self {
        match topology {
            Topology::PointList => Self::PointList,
            Topology::LineList => Self::LineList,
            Topology::LineStrip => Self::LineStrip,
            Topology::TriangleList => Self::TriangleList,
            Topology::TriangleStrip => Self::TriangleStrip,
        }
    }
}

/// Index element datatype.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    #[inline]
    pub fn size(self) -> u64 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

impl From<IndexType> for wgpu::IndexFormat {
    fn from(ty: IndexType) -> Self {
        match ty {
            IndexType::U16 => Self::Uint16,
            IndexType::U32 => Self::Uint32,
        }
    }
}

/// Borrowed index data handed to a device when a model's element buffer is created.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IndexData<'a> {
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl IndexData<'_> {
    #[inline]
    pub fn index_type(&self) -> IndexType {
        match self {
            Self::U16(_) => IndexType::U16,
            Self::U32(_) => IndexType::U32,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(i) => i.len(),
            Self::U32(i) => i.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw little-endian bytes, as uploaded to an index buffer.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(i) => bytemuck::cast_slice(i),
            Self::U32(i) => bytemuck::cast_slice(i),
        }
    }
}

/// Supplies the vertex data and topology of one model.
///
/// A source is shared by reference with the pool for as long as its handle lives
/// and must keep reporting the same vertex count: the pool packs models by the
/// count observed at allocation.
pub trait ModelSource {
    /// Layout of the vertices written by [`write_vertices`](Self::write_vertices).
    fn format(&self) -> &VertexFormat;

    fn vertex_count(&self) -> u32;

    /// Writes exactly `vertex_count() * stride` bytes at the view's current position.
    fn write_vertices(&self, view: &mut MappedView) -> Result<()>;

    /// Index data for the model's private element buffer.
    fn indices(&self) -> IndexData<'_>;

    fn topology(&self) -> Topology {
        Topology::TriangleList
    }
}
