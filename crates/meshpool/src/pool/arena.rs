use std::rc::Rc;

use anyhow::{Context, Result};

use super::format::align_up;
use super::handle::Entry;
use super::{
    DrawBackend, MappedView, ModelHandle, ModelSource, ModelState, PoolConfig,
    PoolDevice, PoolError, PooledModel, STRIDE_ALIGNMENT, UploadedModel, VertexFormat,
};

/// What a flush wrote to the device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Upload {
    /// The pool was clean; nothing happened.
    None,
    /// Only models added or moved since the previous flush were written.
    Partial,
    /// The buffer was reallocated and every live model was written.
    Full,
}

/// Summary of one [`ModelPool::flush`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub upload: Upload,
    pub models_written: usize,
    pub bytes_written: u64,
    /// Models compacted away by this flush.
    pub removed: usize,
    /// Device buffer size after the flush.
    pub capacity: u64,
}

impl FlushReport {
    fn clean(capacity: u64) -> Self {
        Self {
            upload: Upload::None,
            models_written: 0,
            bytes_written: 0,
            removed: 0,
            capacity,
        }
    }
}

struct Slot<E> {
    generation: u32,
    entry: Option<Entry<E>>,
}

/// Packs many models into one growable vertex buffer.
///
/// Mutations are two-phase: [`alloc`](Self::alloc) and [`delete`](Self::delete)
/// only do bookkeeping, and [`flush`](Self::flush) performs all vertex-buffer
/// I/O. After a flush, models sit back to back in allocation order and each one
/// draws from the shared buffer through its base vertex.
///
/// The pool holds `Rc` references to its models and is therefore tied to one
/// thread, which should be the thread owning the graphics context.
pub struct ModelPool<D: PoolDevice> {
    config: PoolConfig,
    format: VertexFormat,
    device: D,

    slots: Vec<Slot<D::Elements>>,
    free_slots: Vec<u32>,

    /// Slot indices in packing order.
    order: Vec<u32>,
    /// Slot indices whose bytes must be written on the next flush. Entries carry a
    /// `pending` flag so an index appears at most once.
    pending_upload: Vec<u32>,

    total_vertices: u32,
    dirty: bool,
    pending_deletions: bool,
    /// Set on reallocation and cleared by the next completed full upload, so a
    /// failed flush after growth still rewrites everything next time.
    needs_full_upload: bool,
}

impl<D: PoolDevice> ModelPool<D> {
    pub fn new(mut device: D, format: VertexFormat, config: PoolConfig) -> Result<Self> {
        let initial = align_up(config.initial_capacity, STRIDE_ALIGNMENT);
        if initial > 0 {
            device
                .allocate(initial)
                .with_context(|| format!("failed to allocate '{}' ({initial} bytes)", config.label))?;
        }

        log::debug!(
            "created model pool '{}' (stride {}, {} bytes)",
            config.label,
            format.stride(),
            device.capacity()
        );

        Ok(Self {
            config,
            format,
            device,
            slots: Vec::new(),
            free_slots: Vec::new(),
            order: Vec::new(),
            pending_upload: Vec::new(),
            total_vertices: 0,
            dirty: false,
            pending_deletions: false,
            needs_full_upload: false,
        })
    }

    // ── allocation ────────────────────────────────────────────────────────

    /// Appends `model` at the end of the vertex range.
    ///
    /// Creates the model's element buffer right away; vertex data is written by
    /// the next [`flush`](Self::flush).
    pub fn alloc(&mut self, model: Rc<dyn ModelSource>) -> Result<ModelHandle> {
        let found = model.format();
        if found != &self.format {
            return Err(PoolError::FormatMismatch {
                expected: self.format.stride(),
                found: found.stride(),
            }
            .into());
        }

        let vertex_count = model.vertex_count();
        let total = self
            .total_vertices
            .checked_add(vertex_count)
            .filter(|&t| t <= i32::MAX as u32)
            .ok_or(PoolError::VertexRangeOverflow)?;

        let elements = self
            .device
            .create_elements(model.indices())
            .with_context(|| format!("failed to create element buffer in '{}'", self.config.label))?;

        let first_vertex = self.total_vertices;
        let handle = self.insert(Entry {
            model,
            elements,
            vertex_count,
            first_vertex,
            marked_for_removal: false,
            pending: true,
            on_upload: None,
        });

        self.order.push(handle.index);
        self.pending_upload.push(handle.index);
        self.total_vertices = total;
        self.dirty = true;

        log::trace!("alloc {handle:?}: {vertex_count} vertices at {first_vertex}");
        Ok(handle)
    }

    /// Marks a model for removal. Its space is reclaimed by the next flush.
    ///
    /// Returns `false` if the handle is stale. Deleting twice is harmless.
    pub fn delete(&mut self, handle: ModelHandle) -> bool {
        let Some(entry) = self.entry_mut(handle) else {
            return false;
        };
        if !entry.marked_for_removal {
            entry.marked_for_removal = true;
            self.pending_deletions = true;
            self.dirty = true;
            log::trace!("delete {handle:?}");
        }
        true
    }

    /// Registers an observer called each time the model's bytes are rewritten.
    ///
    /// Replaces any previous callback. Returns `false` if the handle is stale.
    pub fn set_upload_callback<F>(&mut self, handle: ModelHandle, callback: F) -> bool
    where
        F: FnMut(&UploadedModel) + 'static,
    {
        match self.entry_mut(handle) {
            Some(entry) => {
                entry.on_upload = Some(Box::new(callback));
                true
            }
            None => false,
        }
    }

    pub fn clear_upload_callback(&mut self, handle: ModelHandle) {
        if let Some(entry) = self.entry_mut(handle) {
            entry.on_upload = None;
        }
    }

    // ── flush ─────────────────────────────────────────────────────────────

    /// Brings the device buffer up to date.
    ///
    /// Compacts deleted models, grows the buffer if the packed size no longer
    /// fits, then writes either every model (after growth) or only the models
    /// added or moved since the last flush. A clean pool does nothing.
    pub fn flush(&mut self) -> Result<FlushReport> {
        if !self.dirty {
            return Ok(FlushReport::clean(self.device.capacity()));
        }

        let removed = if self.pending_deletions { self.compact() } else { 0 };

        self.grow_if_needed()?;

        let upload = if self.needs_full_upload {
            Upload::Full
        } else {
            Upload::Partial
        };
        let targets = match upload {
            Upload::Full => &self.order,
            _ => &self.pending_upload,
        };

        // Entry state only changes once the bytes are on the device, so a failed
        // flush leaves every target pending for the retry.
        let mut view = MappedView::new(0, self.device.capacity());
        stage_models(&self.slots, targets, self.format.stride(), &mut view)?;

        let bytes_written = view
            .flush(&mut self.device)
            .with_context(|| format!("failed to flush '{}'", self.config.label))?;

        let models_written = finish_uploads(&mut self.slots, targets);

        self.pending_upload.clear();
        self.needs_full_upload = false;
        self.dirty = false;

        let report = FlushReport {
            upload,
            models_written,
            bytes_written,
            removed,
            capacity: self.device.capacity(),
        };
        log::trace!("flushed '{}': {report:?}", self.config.label);
        Ok(report)
    }

    /// Drops models marked for removal and repacks the rest.
    ///
    /// Every survivor whose offset changes is queued for upload. Returns the
    /// number of models removed.
    fn compact(&mut self) -> usize {
        let before = self.order.len();

        let slots = &mut self.slots;
        let free_slots = &mut self.free_slots;
        self.order.retain(|&index| {
            let slot = &mut slots[index as usize];
            let remove = slot.entry.as_ref().is_some_and(|e| e.marked_for_removal);
            if remove {
                slot.entry = None;
                slot.generation = slot.generation.wrapping_add(1);
                free_slots.push(index);
            }
            !remove
        });
        self.pending_upload
            .retain(|&index| slots[index as usize].entry.is_some());

        let mut vertices = 0u32;
        for &index in &self.order {
            let Some(entry) = self.slots[index as usize].entry.as_mut() else {
                continue;
            };
            if entry.first_vertex != vertices {
                entry.first_vertex = vertices;
                if !entry.pending {
                    entry.pending = true;
                    self.pending_upload.push(index);
                }
            }
            vertices += entry.vertex_count;
        }

        let removed = before - self.order.len();
        log::debug!(
            "compacted '{}': removed {removed} models, {vertices} vertices remain",
            self.config.label
        );

        self.total_vertices = vertices;
        self.pending_deletions = false;
        removed
    }

    /// Reallocates the device buffer when the packed vertices no longer fit.
    fn grow_if_needed(&mut self) -> Result<()> {
        let needed = u64::from(self.total_vertices) * self.format.stride();
        let capacity = self.device.capacity();
        if needed <= capacity {
            return Ok(());
        }

        let new_capacity = align_up(needed + self.config.growth_slack, STRIDE_ALIGNMENT);
        log::debug!(
            "growing '{}': {capacity} -> {new_capacity} bytes",
            self.config.label
        );

        self.device
            .allocate(new_capacity)
            .with_context(|| format!("failed to grow '{}' to {new_capacity} bytes", self.config.label))?;

        // Contents are gone once the old storage is replaced.
        self.needs_full_upload = true;
        for &index in &self.order {
            if let Some(entry) = self.slots[index as usize].entry.as_mut() {
                entry.pending = true;
            }
        }
        Ok(())
    }

    /// Releases the device buffer and hands back the released device.
    ///
    /// Handles into this pool are meaningless afterwards.
    pub fn destroy(mut self) -> D {
        log::debug!("destroying model pool '{}'", self.config.label);
        self.device.release();
        self.device
    }

    // ── queries ───────────────────────────────────────────────────────────

    #[inline]
    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Device buffer size in bytes.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.device.capacity()
    }

    /// Vertices of every model in the packing order, including models marked
    /// for removal that were not compacted yet.
    #[inline]
    pub fn total_vertices(&self) -> u32 {
        self.total_vertices
    }

    /// Number of models in the packing order.
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Unflushed allocations, deletions or moves exist.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Models waiting to be written by the next flush.
    #[inline]
    pub fn pending_uploads(&self) -> usize {
        self.pending_upload.len()
    }

    #[inline]
    pub fn contains(&self, handle: ModelHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn state(&self, handle: ModelHandle) -> ModelState {
        self.entry(handle).map_or(ModelState::Removed, Entry::state)
    }

    pub fn get(&self, handle: ModelHandle) -> Option<PooledModel<'_, D::Elements>> {
        self.entry(handle).map(|entry| PooledModel::new(handle, entry))
    }

    /// Models in packing order.
    pub fn iter(&self) -> impl Iterator<Item = PooledModel<'_, D::Elements>> + '_ {
        self.order.iter().filter_map(move |&index| {
            let slot = &self.slots[index as usize];
            let handle = ModelHandle {
                index,
                generation: slot.generation,
            };
            slot.entry.as_ref().map(|entry| PooledModel::new(handle, entry))
        })
    }

    /// Draws every model in packing order, once each.
    ///
    /// The shared vertex buffer must already be bound on `backend`.
    pub fn draw_all<B>(&self, backend: &mut B)
    where
        B: DrawBackend<D::Elements> + ?Sized,
    {
        for model in self.iter() {
            model.draw_call(backend);
        }
    }

    // ── slots ─────────────────────────────────────────────────────────────

    fn insert(&mut self, entry: Entry<D::Elements>) -> ModelHandle {
        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return ModelHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        ModelHandle {
            index,
            generation: 0,
        }
    }

    fn entry(&self, handle: ModelHandle) -> Option<&Entry<D::Elements>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: ModelHandle) -> Option<&mut Entry<D::Elements>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

}

/// Stages the vertices of each target into `view` at its packed offset.
fn stage_models<E>(
    slots: &[Slot<E>],
    targets: &[u32],
    stride: u64,
    view: &mut MappedView,
) -> Result<()> {
    for &index in targets {
        let slot = &slots[index as usize];
        let handle = ModelHandle {
            index,
            generation: slot.generation,
        };
        let Some(entry) = slot.entry.as_ref() else {
            continue;
        };

        let start = u64::from(entry.first_vertex) * stride;
        let len = u64::from(entry.vertex_count) * stride;
        view.enter_region(start, len);
        entry
            .model
            .write_vertices(view)
            .with_context(|| format!("failed to write vertices of {handle:?}"))?;
        let produced = view.leave_region();
        if produced < len {
            log::warn!("{handle:?} wrote {produced} of {len} bytes; zero-filled the rest");
        }
        log::trace!("staged {handle:?} at byte {start} ({len} bytes)");
    }
    Ok(())
}

/// Marks committed targets live and notifies upload observers. Returns the
/// number of models written.
fn finish_uploads<E>(slots: &mut [Slot<E>], targets: &[u32]) -> usize {
    let mut written = 0;
    for &index in targets {
        let slot = &mut slots[index as usize];
        let handle = ModelHandle {
            index,
            generation: slot.generation,
        };
        let Some(entry) = slot.entry.as_mut() else {
            continue;
        };

        entry.pending = false;
        written += 1;

        if let Some(callback) = entry.on_upload.as_mut() {
            callback(&UploadedModel {
                handle,
                first_vertex: entry.first_vertex,
                vertex_count: entry.vertex_count,
            });
        }
    }
    written
}
