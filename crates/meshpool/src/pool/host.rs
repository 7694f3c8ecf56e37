//! In-memory pool device.
//!
//! Mirrors the vertex buffer in host memory and records every allocation and
//! commit. Used for headless runs and for testing upload behavior without a GPU.

use std::ops::Range;

use anyhow::{Result, ensure};

use super::{DrawBackend, DrawElements, ElementBuffer, IndexData, IndexType, PoolDevice};

#[derive(Debug, Default)]
pub struct HostPoolDevice {
    data: Vec<u8>,
    allocations: Vec<u64>,
    writes: Vec<Range<u64>>,
    released: bool,
    allocation_limit: Option<u64>,
    fail_writes: bool,
}

impl HostPoolDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current buffer contents.
    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Sizes passed to every `allocate` call, oldest first.
    #[inline]
    pub fn allocations(&self) -> &[u64] {
        &self.allocations
    }

    /// Byte ranges of every commit, oldest first.
    #[inline]
    pub fn writes(&self) -> &[Range<u64>] {
        &self.writes
    }

    pub fn bytes_written(&self) -> u64 {
        self.writes.iter().map(|r| r.end - r.start).sum()
    }

    /// Forgets recorded allocations and writes; contents are kept.
    pub fn clear_history(&mut self) {
        self.allocations.clear();
        self.writes.clear();
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Makes `allocate` fail for sizes above `limit`, like a device buffer
    /// size limit. `None` removes the limit.
    pub fn set_allocation_limit(&mut self, limit: Option<u64>) {
        self.allocation_limit = limit;
    }

    /// Makes every `write` fail while set.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl PoolDevice for HostPoolDevice {
    type Elements = HostElements;

    fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    fn allocate(&mut self, size: u64) -> Result<()> {
        ensure!(!self.released, "host pool device used after release");
        if let Some(limit) = self.allocation_limit {
            ensure!(size <= limit, "{size} bytes exceeds the allocation limit ({limit})");
        }
        self.data = vec![0; size as usize];
        self.allocations.push(size);
        Ok(())
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        ensure!(!self.released, "host pool device used after release");
        ensure!(!self.fail_writes, "host pool device rejected a write");
        let end = offset + bytes.len() as u64;
        ensure!(
            end <= self.capacity(),
            "write {offset}..{end} exceeds capacity {}",
            self.capacity()
        );
        self.data[offset as usize..end as usize].copy_from_slice(bytes);
        self.writes.push(offset..end);
        Ok(())
    }

    fn create_elements(&mut self, indices: IndexData<'_>) -> Result<HostElements> {
        let widened = match indices {
            IndexData::U16(i) => i.iter().map(|&i| u32::from(i)).collect(),
            IndexData::U32(i) => i.to_vec(),
        };
        Ok(HostElements {
            indices: widened,
            index_type: indices.index_type(),
        })
    }

    fn release(&mut self) {
        self.data = Vec::new();
        self.released = true;
    }
}

/// Host copy of a model's indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostElements {
    indices: Vec<u32>,
    index_type: IndexType,
}

impl HostElements {
    /// Indices widened to `u32`.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl ElementBuffer for HostElements {
    fn element_count(&self) -> u32 {
        self.indices.len() as u32
    }

    fn index_type(&self) -> IndexType {
        self.index_type
    }
}

/// Draw backend that records draws instead of issuing them.
#[derive(Debug, Default)]
pub struct DrawRecorder {
    pub draws: Vec<DrawElements>,
}

impl<E: ?Sized> DrawBackend<E> for DrawRecorder {
    fn draw_elements(&mut self, _elements: &E, draw: &DrawElements) {
        self.draws.push(*draw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_replaces_contents() {
        let mut device = HostPoolDevice::new();
        device.allocate(8).unwrap();
        device.write(0, &[1, 2, 3, 4]).unwrap();
        device.allocate(16).unwrap();
        assert_eq!(device.contents(), &[0u8; 16]);
        assert_eq!(device.allocations(), &[8, 16]);
    }

    #[test]
    fn write_past_capacity_fails() {
        let mut device = HostPoolDevice::new();
        device.allocate(8).unwrap();
        assert!(device.write(4, &[0; 8]).is_err());
        assert!(device.writes().is_empty());
    }

    #[test]
    fn over_limit_allocation_keeps_old_storage() {
        let mut device = HostPoolDevice::new();
        device.allocate(8).unwrap();
        device.write(0, &[7; 4]).unwrap();
        device.set_allocation_limit(Some(8));

        assert!(device.allocate(16).is_err());
        assert_eq!(device.capacity(), 8);
        assert_eq!(&device.contents()[..4], &[7; 4]);
        assert_eq!(device.allocations(), &[8]);
    }

    #[test]
    fn failing_writes_leave_contents_alone() {
        let mut device = HostPoolDevice::new();
        device.allocate(8).unwrap();
        device.set_fail_writes(true);
        assert!(device.write(0, &[1; 4]).is_err());
        assert_eq!(device.bytes_written(), 0);

        device.set_fail_writes(false);
        device.write(0, &[1; 4]).unwrap();
        assert_eq!(device.bytes_written(), 4);
    }

    #[test]
    fn u16_indices_keep_their_type() {
        let mut device = HostPoolDevice::new();
        let elements = device.create_elements(IndexData::U16(&[0, 1, 2])).unwrap();
        assert_eq!(elements.element_count(), 3);
        assert_eq!(elements.index_type(), IndexType::U16);
        assert_eq!(elements.indices(), &[0, 1, 2]);
    }

    #[test]
    fn release_rejects_further_use() {
        let mut device = HostPoolDevice::new();
        device.allocate(4).unwrap();
        device.release();
        assert!(device.is_released());
        assert_eq!(device.capacity(), 0);
        assert!(device.allocate(4).is_err());
    }
}
