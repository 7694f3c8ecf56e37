use std::ops::Range;

use anyhow::{Context, Result};
use bytemuck::Pod;

use super::{PoolDevice, PoolError};

/// Host-visible window over a byte range of a pool's device buffer.
///
/// Writes are staged on the host as contiguous spans and committed to the device
/// by [`flush`](Self::flush). Positions are absolute byte offsets into the device
/// buffer. During an upload the pool confines writes to the region owned by the
/// model being written; writing past it fails with
/// [`PoolError::WriteOutOfBounds`].
#[derive(Debug)]
pub struct MappedView {
    range: Range<u64>,
    region: Range<u64>,
    position: u64,
    /// Furthest byte written inside the current region.
    high_water: u64,
    spans: Vec<Span>,
}

#[derive(Debug)]
struct Span {
    offset: u64,
    bytes: Vec<u8>,
}

impl Span {
    #[inline]
    fn end(&self) -> u64 {
        self.offset + self.bytes.len() as u64
    }
}

impl MappedView {
    pub(crate) fn new(offset: u64, len: u64) -> Self {
        let range = offset..offset + len;
        Self {
            region: range.clone(),
            position: offset,
            high_water: offset,
            range,
            spans: Vec::new(),
        }
    }

    /// Mapped byte range within the device buffer.
    #[inline]
    pub fn range(&self) -> Range<u64> {
        self.range.clone()
    }

    /// Absolute byte offset of the next write.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes left before the end of the writable region.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.region.end.saturating_sub(self.position)
    }

    /// Moves the write cursor. The position must lie inside the writable region.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        if position < self.region.start || position > self.region.end {
            return Err(PoolError::WriteOutOfBounds {
                offset: position,
                len: 0,
                end: self.region.end,
            }
            .into());
        }
        self.position = position;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as u64;
        if self.position < self.region.start || self.position + len > self.region.end {
            return Err(PoolError::WriteOutOfBounds {
                offset: self.position,
                len,
                end: self.region.end,
            }
            .into());
        }

        match self.spans.last_mut() {
            Some(span) if span.end() == self.position => span.bytes.extend_from_slice(bytes),
            _ => self.spans.push(Span {
                offset: self.position,
                bytes: bytes.to_vec(),
            }),
        }
        self.position += len;
        self.high_water = self.high_water.max(self.position);
        Ok(())
    }

    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> Result<()> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) -> Result<()> {
        self.write_bytes(bytemuck::cast_slice(values))
    }

    /// Total bytes staged so far.
    pub fn staged_bytes(&self) -> u64 {
        self.spans.iter().map(|s| s.bytes.len() as u64).sum()
    }

    /// Confines writes to `start..start + len` and moves the cursor to `start`.
    pub(crate) fn enter_region(&mut self, start: u64, len: u64) {
        debug_assert!(start >= self.range.start && start + len <= self.range.end);
        self.region = start..start + len;
        self.position = start;
        self.high_water = start;
    }

    /// Leaves the current region, zero-filling past the furthest byte the writer
    /// reached.
    ///
    /// Returns the extent the writer produced, measured from the region start.
    pub(crate) fn leave_region(&mut self) -> u64 {
        let end = self.region.end;
        let written = self.high_water - self.region.start;
        let missing = self.region.end - self.high_water;
        if missing > 0 {
            self.position = self.high_water;
            let zeros = vec![0u8; missing as usize];
            // The region is still active, so this cannot go out of bounds.
            let _ = self.write_bytes(&zeros);
        }
        self.region = self.range.clone();
        self.position = end;
        written
    }

    /// Commits every staged span to `device`, in write order.
    ///
    /// Returns the number of bytes committed.
    pub fn flush<D: PoolDevice + ?Sized>(self, device: &mut D) -> Result<u64> {
        let mut committed = 0;
        for span in &self.spans {
            device
                .write(span.offset, &span.bytes)
                .with_context(|| {
                    format!("failed to commit {} bytes at offset {}", span.bytes.len(), span.offset)
                })?;
            committed += span.bytes.len() as u64;
        }
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(view: &MappedView) -> Vec<(u64, usize)> {
        view.spans.iter().map(|s| (s.offset, s.bytes.len())).collect()
    }

    #[test]
    fn contiguous_writes_share_a_span() {
        let mut view = MappedView::new(0, 64);
        view.write_slice(&[1u32, 2, 3]).unwrap();
        view.write_pod(&4u32).unwrap();
        assert_eq!(spans(&view), vec![(0, 16)]);
        assert_eq!(view.position(), 16);
    }

    #[test]
    fn seek_starts_a_new_span() {
        let mut view = MappedView::new(0, 64);
        view.write_pod(&1u32).unwrap();
        view.set_position(32).unwrap();
        view.write_pod(&2u32).unwrap();
        assert_eq!(spans(&view), vec![(0, 4), (32, 4)]);
        assert_eq!(view.staged_bytes(), 8);
    }

    #[test]
    fn write_past_region_is_rejected() {
        let mut view = MappedView::new(0, 64);
        view.enter_region(8, 8);
        view.write_pod(&[0u32; 2]).unwrap();
        let err = view.write_pod(&0u32).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PoolError>(),
            Some(&PoolError::WriteOutOfBounds { offset: 16, len: 4, end: 16 })
        );
    }

    #[test]
    fn seek_outside_region_is_rejected() {
        let mut view = MappedView::new(0, 64);
        view.enter_region(8, 8);
        assert!(view.set_position(4).is_err());
        assert!(view.set_position(17).is_err());
        assert!(view.set_position(16).is_ok());
        assert_eq!(view.remaining(), 0);
    }

    #[test]
    fn leave_region_zero_fills_the_tail() {
        let mut view = MappedView::new(0, 64);
        view.enter_region(0, 12);
        view.write_pod(&7u32).unwrap();
        assert_eq!(view.leave_region(), 4);
        assert_eq!(spans(&view), vec![(0, 12)]);
        assert_eq!(view.remaining(), 64 - 12);
    }

    #[test]
    fn backward_seek_keeps_earlier_bytes() {
        let mut view = MappedView::new(0, 64);
        view.enter_region(0, 16);
        view.write_bytes(&[0xAB; 12]).unwrap();
        view.set_position(0).unwrap();
        view.write_bytes(&[0xCD; 4]).unwrap();

        // Only the 4 bytes past the furthest write are zero-filled.
        assert_eq!(view.leave_region(), 12);
        assert_eq!(spans(&view), vec![(0, 12), (0, 4), (12, 4)]);
        assert_eq!(view.position(), 16);
    }
}
