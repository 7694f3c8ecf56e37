use std::rc::Rc;

use super::{DrawBackend, DrawElements, ElementBuffer, ModelSource};

/// Stable identifier of a model inside a [`ModelPool`](super::ModelPool).
///
/// Handles are plain values: compaction moves vertex data without touching
/// them. Once the model is removed the handle goes stale and every lookup
/// through it reports absence, even if the slot is later reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    pub(super) index: u32,
    pub(super) generation: u32,
}

/// Upload lifecycle of a model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ModelState {
    /// Allocated or moved; the device copy is not current until the next flush.
    Pending,
    /// Flushed at its current offset; drawable.
    Live,
    /// Deleted and compacted away (or never belonged to this pool).
    Removed,
}

/// Placement reported to upload callbacks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UploadedModel {
    pub handle: ModelHandle,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// Observer invoked synchronously during a flush, once per rewrite of its model,
/// after the model's bytes were staged.
///
/// The callback only sees the placement; it has no access to the pool, so it
/// cannot allocate or delete while a flush is running.
pub type UploadCallback = Box<dyn FnMut(&UploadedModel)>;

pub(super) struct Entry<E> {
    pub(super) model: Rc<dyn ModelSource>,
    pub(super) elements: E,
    pub(super) vertex_count: u32,
    pub(super) first_vertex: u32,
    pub(super) marked_for_removal: bool,
    pub(super) pending: bool,
    pub(super) on_upload: Option<UploadCallback>,
}

impl<E> Entry<E> {
    #[inline]
    pub(super) fn state(&self) -> ModelState {
        if self.pending {
            ModelState::Pending
        } else {
            ModelState::Live
        }
    }
}

/// Borrowed view of one pooled model.
pub struct PooledModel<'a, E> {
    handle: ModelHandle,
    entry: &'a Entry<E>,
}

impl<'a, E> PooledModel<'a, E> {
    pub(super) fn new(handle: ModelHandle, entry: &'a Entry<E>) -> Self {
        Self { handle, entry }
    }

    #[inline]
    pub fn handle(&self) -> ModelHandle {
        self.handle
    }

    /// Base offset, in vertices, into the shared vertex buffer.
    #[inline]
    pub fn first_vertex(&self) -> u32 {
        self.entry.first_vertex
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.entry.vertex_count
    }

    #[inline]
    pub fn model(&self) -> &'a Rc<dyn ModelSource> {
        &self.entry.model
    }

    #[inline]
    pub fn elements(&self) -> &'a E {
        &self.entry.elements
    }

    #[inline]
    pub fn state(&self) -> ModelState {
        self.entry.state()
    }

    /// Deleted but not yet compacted away.
    #[inline]
    pub fn is_marked_for_removal(&self) -> bool {
        self.entry.marked_for_removal
    }
}

impl<E: ElementBuffer> PooledModel<'_, E> {
    /// Has both vertices and elements to draw.
    pub fn is_drawable(&self) -> bool {
        self.entry.vertex_count > 0 && self.entry.elements.element_count() > 0
    }

    /// Draws the model once.
    ///
    /// The pool must have been flushed since this model was allocated or moved;
    /// drawing a pending model reads stale vertices.
    pub fn draw_call<B>(&self, backend: &mut B)
    where
        B: DrawBackend<E> + ?Sized,
    {
        self.draw_instances(1, backend);
    }

    /// Draws `instance_count` instances of the model.
    ///
    /// Same flush precondition as [`draw_call`](Self::draw_call).
    pub fn draw_instances<B>(&self, instance_count: u32, backend: &mut B)
    where
        B: DrawBackend<E> + ?Sized,
    {
        debug_assert_eq!(
            self.state(),
            ModelState::Live,
            "drawing {:?} before the pool was flushed",
            self.handle
        );
        if instance_count == 0 || !self.is_drawable() {
            return;
        }

        let elements = &self.entry.elements;
        let draw = DrawElements {
            topology: self.entry.model.topology(),
            element_count: elements.element_count(),
            index_type: elements.index_type(),
            index_offset: 0,
            instance_count,
            base_vertex: self.entry.first_vertex as i32,
        };

        log::trace!("draw {:?}: {:?}", self.handle, draw);
        backend.draw_elements(elements, &draw);
    }
}
