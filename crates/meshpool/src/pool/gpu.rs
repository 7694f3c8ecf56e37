//! wgpu implementation of the pool device and draw backend.

use anyhow::{Result, bail, ensure};
use wgpu::util::DeviceExt;

use super::{DrawBackend, DrawElements, ElementBuffer, IndexData, IndexType, PoolDevice};

/// Pool device backed by a single wgpu vertex buffer.
///
/// Commits go through `Queue::write_buffer`, so they are ordered before any
/// command buffer submitted afterwards.
pub struct GpuPoolDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    label: String,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
}

impl GpuPoolDevice {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, label: impl Into<String>) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            label: label.into(),
            buffer: None,
            capacity: 0,
        }
    }

    /// The shared vertex buffer, once allocated.
    #[inline]
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Binds the shared vertex buffer to `slot`. Does nothing before the first
    /// allocation.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, slot: u32) {
        if let Some(buffer) = self.buffer.as_ref() {
            pass.set_vertex_buffer(slot, buffer.slice(..));
        }
    }
}

impl PoolDevice for GpuPoolDevice {
    type Elements = GpuElementBuffer;

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn allocate(&mut self, size: u64) -> Result<()> {
        // Check before touching the current buffer so a refused growth leaves it usable.
        let max = self.device.limits().max_buffer_size;
        ensure!(size <= max, "'{}': {size} bytes exceeds the device buffer limit ({max})", self.label);

        if let Some(old) = self.buffer.take() {
            old.destroy();
        }

        if size > 0 {
            self.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        self.capacity = size;
        Ok(())
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let Some(buffer) = self.buffer.as_ref() else {
            bail!("'{}': write before the vertex buffer was allocated", self.label);
        };
        let end = offset + bytes.len() as u64;
        ensure!(end <= self.capacity, "'{}': write {offset}..{end} exceeds capacity {}", self.label, self.capacity);

        self.queue.write_buffer(buffer, offset, bytes);
        Ok(())
    }

    fn create_elements(&mut self, indices: IndexData<'_>) -> Result<GpuElementBuffer> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("meshpool element buffer"),
            contents: indices.as_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(GpuElementBuffer {
            buffer,
            element_count: indices.len() as u32,
            index_type: indices.index_type(),
        })
    }

    fn release(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            buffer.destroy();
        }
        self.capacity = 0;
    }
}

/// A model's private wgpu index buffer.
pub struct GpuElementBuffer {
    buffer: wgpu::Buffer,
    element_count: u32,
    index_type: IndexType,
}

impl GpuElementBuffer {
    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl ElementBuffer for GpuElementBuffer {
    fn element_count(&self) -> u32 {
        self.element_count
    }

    fn index_type(&self) -> IndexType {
        self.index_type
    }
}

/// Topology is pipeline state in wgpu; the pass draws with whatever the bound
/// pipeline declares.
impl DrawBackend<GpuElementBuffer> for wgpu::RenderPass<'_> {
    fn draw_elements(&mut self, elements: &GpuElementBuffer, draw: &DrawElements) {
        self.set_index_buffer(elements.buffer.slice(..), draw.index_type.into());

        let first = draw.index_offset;
        self.draw_indexed(
            first..first + draw.element_count,
            draw.base_vertex,
            0..draw.instance_count,
        );
    }
}
