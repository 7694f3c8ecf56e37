//! Procedural meshes used by the demo. Positions are baked in NDC.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use meshpool::pool::{Mesh, VertexFormat};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ColorVertex {
    pub pos: [f32; 2],
    pub color: [f32; 4],
}

impl ColorVertex {
    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x4  // color
    ];

    pub fn format() -> Result<VertexFormat> {
        VertexFormat::new(&Self::ATTRS)
    }
}

pub fn quad(
    format: &VertexFormat,
    center: [f32; 2],
    half: f32,
    color: [f32; 4],
) -> Result<Mesh<ColorVertex>> {
    let [x, y] = center;
    let vertices = [
        [x - half, y - half],
        [x + half, y - half],
        [x + half, y + half],
        [x - half, y + half],
    ]
    .map(|pos| ColorVertex { pos, color })
    .to_vec();

    Mesh::new(format.clone(), vertices, vec![0u16, 1, 2, 0, 2, 3])
}

pub fn triangle(
    format: &VertexFormat,
    center: [f32; 2],
    half: f32,
    color: [f32; 4],
) -> Result<Mesh<ColorVertex>> {
    let [x, y] = center;
    let vertices = [[x - half, y - half], [x + half, y - half], [x, y + half]]
        .map(|pos| ColorVertex { pos, color })
        .to_vec();

    Mesh::new(format.clone(), vertices, vec![0u16, 1, 2])
}

/// Cell centers of an `n` x `n` grid covering NDC, row-major.
pub fn grid(n: u32) -> impl Iterator<Item = [f32; 2]> {
    let step = 2.0 / n as f32;
    (0..n * n).map(move |i| {
        let (col, row) = (i % n, i / n);
        [
            -1.0 + step * (col as f32 + 0.5),
            -1.0 + step * (row as f32 + 0.5),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_matches_format_stride() {
        let format = ColorVertex::format().unwrap();
        assert_eq!(format.stride(), std::mem::size_of::<ColorVertex>() as u64);
    }

    #[test]
    fn grid_covers_ndc() {
        let cells: Vec<_> = grid(2).collect();
        assert_eq!(cells, vec![[-0.5, -0.5], [0.5, -0.5], [-0.5, 0.5], [0.5, 0.5]]);
    }
}
