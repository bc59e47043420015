//! Drag-and-snap positioning of layout blocks.
//!
//! ## States
//!
//! ```text
//!          pointer_down               pointer_up
//!   Idle ───────────────► Dragging ───────────────► Committing ──► Idle
//!                           │  ▲                      (emits one
//!              pointer_move │  │ animation_frame       change per
//!                           ▼  │                       moved axis)
//!                      pending frame slot
//! ```
//!
//! Every move snaps the candidate offset to a 5px grid and clamps it so the
//! block's rectangle stays inside its container on each axis. Offsets are
//! relative to the block's flow position, so the clamp bounds `base + offset`
//! and an offset can be negative. Moves between
//! two animation frames overwrite the same pending slot, so at most one
//! visual update is produced per frame.

use log::debug;

use crate::document::{BlockKey, Offset};
use crate::layout::Rect;

/// Grid step for dragged offsets, in pixels.
pub const SNAP: f64 = 5.0;

/// One committed axis of a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutChange {
    X(f64),
    Y(f64),
}

/// Live measurements taken when the drag starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragBounds {
    /// The block's flow position and rendered size, offsets excluded.
    pub base: Rect,
    pub container_width: f64,
    pub container_height: f64,
}

impl DragBounds {
    pub fn new(base: Rect, container_width: f64, container_height: f64) -> Self {
        Self {
            base,
            container_width,
            container_height,
        }
    }

    /// Snap and clamp a candidate offset.
    pub fn constrain(&self, candidate: Offset) -> Offset {
        Offset::new(
            constrain_axis(candidate.x, self.base.x, self.base.width, self.container_width),
            constrain_axis(candidate.y, self.base.y, self.base.height, self.container_height),
        )
    }
}

/// Round to the nearest multiple of [`SNAP`], halves away from zero.
pub fn snap(value: f64) -> f64 {
    (value / SNAP).round() * SNAP + 0.0
}

/// Snap `offset`, then clamp it so that `0 <= base + offset <= extent - size`.
///
/// The bounds themselves are moved inward onto the grid, so the result is
/// always a multiple of [`SNAP`]. A block larger than its container is
/// pinned to the leading edge.
fn constrain_axis(offset: f64, base: f64, size: f64, extent: f64) -> f64 {
    let min = (-base / SNAP).ceil() * SNAP;
    let max = ((extent - size - base) / SNAP).floor() * SNAP;
    let snapped = snap(offset);
    if max < min {
        return min + 0.0;
    }
    snapped.clamp(min, max) + 0.0
}

#[derive(Debug, Clone, PartialEq)]
struct Session {
    key: BlockKey,
    origin_offset: Offset,
    origin_pointer: (f64, f64),
    current: Offset,
    bounds: DragBounds,
}

impl Session {
    fn track(&mut self, pointer: (f64, f64)) -> Offset {
        let candidate = Offset::new(
            self.origin_offset.x + pointer.0 - self.origin_pointer.0,
            self.origin_offset.y + pointer.1 - self.origin_pointer.1,
        );
        self.current = self.bounds.constrain(candidate);
        self.current
    }

    fn changes(&self) -> Vec<LayoutChange> {
        let mut changes = Vec::with_capacity(2);
        if self.current.x != self.origin_offset.x {
            changes.push(LayoutChange::X(self.current.x));
        }
        if self.current.y != self.origin_offset.y {
            changes.push(LayoutChange::Y(self.current.y));
        }
        changes
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging(Session),
    Committing(Session),
}

/// A visual update waiting for the next animation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub key: BlockKey,
    pub offset: Offset,
}

/// Result of a finished drag.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub key: BlockKey,
    /// Final constrained offset, both axes.
    pub offset: Offset,
    /// Axes that differ from the offset at pointer-down.
    pub changes: Vec<LayoutChange>,
}

/// Drives one drag at a time.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
    pending: Option<Frame>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// The block being dragged, if any.
    pub fn active(&self) -> Option<BlockKey> {
        match &self.state {
            DragState::Dragging(s) | DragState::Committing(s) => Some(s.key),
            DragState::Idle => None,
        }
    }

    /// Capture the pointer for `key`. Returns false if a drag is already running.
    pub fn pointer_down(
        &mut self,
        key: BlockKey,
        pointer: (f64, f64),
        offset: Offset,
        bounds: DragBounds,
    ) -> bool {
        if !matches!(self.state, DragState::Idle) {
            return false;
        }
        debug!("drag start {} at ({}, {})", key, offset.x, offset.y);
        self.state = DragState::Dragging(Session {
            key,
            origin_offset: offset,
            origin_pointer: pointer,
            current: offset,
            bounds,
        });
        self.pending = None;
        true
    }

    /// Track the pointer. The constrained offset replaces whatever frame was
    /// pending; nothing is drawn until [`DragController::animation_frame`].
    pub fn pointer_move(&mut self, pointer: (f64, f64)) -> Option<Offset> {
        let DragState::Dragging(session) = &mut self.state else {
            return None;
        };
        let offset = session.track(pointer);
        self.pending = Some(Frame {
            key: session.key,
            offset,
        });
        Some(offset)
    }

    /// Take the pending visual update, if any.
    pub fn animation_frame(&mut self) -> Option<Frame> {
        self.pending.take()
    }

    /// Finish the drag at `pointer` and return the changed axes, at most one
    /// entry per axis. The controller is idle again afterwards.
    pub fn pointer_up(&mut self, pointer: (f64, f64)) -> Option<Commit> {
        let DragState::Dragging(mut session) = std::mem::take(&mut self.state) else {
            return None;
        };
        session.track(pointer);
        self.state = DragState::Committing(session);
        self.pending = None;

        let DragState::Committing(session) = std::mem::take(&mut self.state) else {
            return None;
        };
        let changes = session.changes();
        debug!(
            "drag commit {} -> ({}, {}), {} axis change(s)",
            session.key,
            session.current.x,
            session.current.y,
            changes.len()
        );
        Some(Commit {
            key: session.key,
            offset: session.current,
            changes,
        })
    }

    /// Abandon the drag without committing.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
        self.pending = None;
    }
}
