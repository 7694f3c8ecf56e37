use anyhow::Result;

use super::PoolError;

/// Required alignment of vertex strides and of every byte offset written into a pool.
///
/// Matches wgpu's vertex stride rule and `COPY_BUFFER_ALIGNMENT`, so any vertex
/// boundary is a legal `write_buffer` offset.
pub const STRIDE_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// Fixed vertex layout shared by every model in a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    stride: u64,
    attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexFormat {
    /// Builds a tightly packed format; the stride is the attribute footprint
    /// rounded up to [`STRIDE_ALIGNMENT`].
    pub fn new(attributes: &[wgpu::VertexAttribute]) -> Result<Self> {
        let required = footprint(attributes).ok_or(PoolError::EmptyFormat)?;
        Ok(Self {
            stride: align_up(required, STRIDE_ALIGNMENT),
            attributes: attributes.to_vec(),
        })
    }

    /// Builds a format with an explicit stride (padding after the attributes).
    pub fn with_stride(stride: u64, attributes: &[wgpu::VertexAttribute]) -> Result<Self> {
        let required = footprint(attributes).ok_or(PoolError::EmptyFormat)?;
        if stride % STRIDE_ALIGNMENT != 0 {
            return Err(PoolError::UnalignedStride(stride).into());
        }
        if stride < required {
            return Err(PoolError::StrideTooSmall { stride, required }.into());
        }
        Ok(Self {
            stride,
            attributes: attributes.to_vec(),
        })
    }

    #[inline]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    #[inline]
    pub fn attributes(&self) -> &[wgpu::VertexAttribute] {
        &self.attributes
    }

    /// Per-vertex layout for pipeline creation.
    pub fn layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// End of the furthest attribute, or `None` for an empty list.
fn footprint(attributes: &[wgpu::VertexAttribute]) -> Option<u64> {
    attributes.iter().map(|a| a.offset + a.format.size()).max()
}

#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POS_COLOR: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Unorm8x4
    ];

    #[test]
    fn stride_is_attribute_footprint() {
        let format = VertexFormat::new(&POS_COLOR).unwrap();
        assert_eq!(format.stride(), 16);
        assert_eq!(format.layout().array_stride, 16);
        assert_eq!(format.layout().attributes.len(), 2);
    }

    #[test]
    fn single_float3_is_twelve_bytes() {
        let format = VertexFormat::new(&wgpu::vertex_attr_array![0 => Float32x3]).unwrap();
        assert_eq!(format.stride(), 12);
    }

    #[test]
    fn packed_stride_rounds_up() {
        let format = VertexFormat::new(&wgpu::vertex_attr_array![0 => Unorm8x2]).unwrap();
        assert_eq!(format.stride(), 4);
    }

    #[test]
    fn empty_format_rejected() {
        let err = VertexFormat::new(&[]).unwrap_err();
        assert_eq!(err.downcast_ref::<PoolError>(), Some(&PoolError::EmptyFormat));
    }

    #[test]
    fn explicit_stride_validated() {
        assert!(VertexFormat::with_stride(32, &POS_COLOR).is_ok());

        let err = VertexFormat::with_stride(18, &POS_COLOR).unwrap_err();
        assert_eq!(err.downcast_ref::<PoolError>(), Some(&PoolError::UnalignedStride(18)));

        let err = VertexFormat::with_stride(12, &POS_COLOR).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PoolError>(),
            Some(&PoolError::StrideTooSmall { stride: 12, required: 16 })
        );
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(120, 4), 120);
        assert_eq!(align_up(121, 4), 124);
    }
}
