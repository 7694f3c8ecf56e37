use anyhow::Result;
use bytemuck::Pod;

use super::{IndexData, MappedView, ModelSource, PoolError, Topology, VertexFormat};

/// Owned index list of a [`Mesh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl From<Vec<u16>> for Indices {
    fn from(indices: Vec<u16>) -> Self {
        Self::U16(indices)
    }
}

impl From<Vec<u32>> for Indices {
    fn from(indices: Vec<u32>) -> Self {
        Self::U32(indices)
    }
}

/// CPU-side mesh: plain-old-data vertices plus an index list.
///
/// The vertex type's size must equal the format stride, so the vertex slice can be
/// uploaded as-is.
#[derive(Debug, Clone)]
pub struct Mesh<V> {
    format: VertexFormat,
    vertices: Vec<V>,
    indices: Indices,
    topology: Topology,
}

impl<V: Pod> Mesh<V> {
    pub fn new(format: VertexFormat, vertices: Vec<V>, indices: impl Into<Indices>) -> Result<Self> {
        let vertex_size = std::mem::size_of::<V>() as u64;
        if vertex_size != format.stride() {
            return Err(PoolError::VertexSizeMismatch {
                vertex_size,
                stride: format.stride(),
            }
            .into());
        }

        Ok(Self {
            format,
            vertices,
            indices: indices.into(),
            topology: Topology::default(),
        })
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    #[inline]
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }
}

impl<V: Pod> ModelSource for Mesh<V> {
    fn format(&self) -> &VertexFormat {
        &self.format
    }

    fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    fn write_vertices(&self, view: &mut MappedView) -> Result<()> {
        view.write_slice(&self.vertices)
    }

    fn indices(&self) -> IndexData<'_> {
        match &self.indices {
            Indices::U16(i) => IndexData::U16(i),
            Indices::U32(i) => IndexData::U32(i),
        }
    }

    fn topology(&self) -> Topology {
        self.topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> VertexFormat {
        VertexFormat::new(&wgpu::vertex_attr_array![0 => Float32x3]).unwrap()
    }

    #[test]
    fn vertex_size_must_match_stride() {
        let err = Mesh::new(format(), vec![[0.0f32; 2]], vec![0u16]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PoolError>(),
            Some(&PoolError::VertexSizeMismatch { vertex_size: 8, stride: 12 })
        );
    }

    #[test]
    fn writes_vertices_verbatim() {
        let verts = vec![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mesh = Mesh::new(format(), verts.clone(), vec![0u32, 1]).unwrap();
        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.indices(), IndexData::U32(&[0, 1]));

        let mut view = MappedView::new(0, 24);
        mesh.write_vertices(&mut view).unwrap();
        assert_eq!(view.position(), 24);
    }

    #[test]
    fn topology_defaults_to_triangles() {
        let mesh = Mesh::new(format(), vec![[0.0f32; 3]], vec![0u16]).unwrap();
        assert_eq!(mesh.topology(), Topology::TriangleList);
        let lines = mesh.with_topology(Topology::LineList);
        assert_eq!(lines.topology(), Topology::LineList);
    }
}
