//! Drag-and-drop reordering.
//!
//! A drag is resolved by one pure function, [`resolve`], that turns the
//! latest pointer position into a destination. Nothing is mutated while the
//! pointer moves; the tree changes exactly once, with a single `move_block`,
//! when the drag is released. Cancelling is therefore free: the pre-drag
//! order was never touched.

use blockwise_model::{BlockId, BlockRepository};

use crate::config::ReorderConfig;
use crate::CoreResult;

/// Pointer state over a hovered block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gesture {
    pub source: BlockId,
    pub hovered: BlockId,
    /// Horizontal pointer offset from the hovered block's left edge.
    pub offset_x: f32,
    /// Vertical pointer offset from the hovered block's top edge.
    pub offset_y: f32,
    /// Height of the hovered block.
    pub height: f32,
}

impl Gesture {
    pub fn new(source: BlockId, hovered: BlockId) -> Self {
        Self {
            source,
            hovered,
            offset_x: 0.0,
            offset_y: 0.0,
            height: 0.0,
        }
    }

    /// Sets the pointer position within the hovered block.
    pub fn at(mut self, offset_x: f32, offset_y: f32, height: f32) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self.height = height;
        self
    }

    /// Returns which half of the hovered block the pointer is in.
    pub fn position(&self) -> DropPosition {
        if self.offset_y * 2.0 < self.height {
            DropPosition::Above
        } else {
            DropPosition::Below
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    Above,
    Below,
}

/// Where a dragged block lands.
///
/// `index` is relative to the destination order with the source removed,
/// which is what `BlockRepository::move_block` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub parent: Option<BlockId>,
    pub index: usize,
}

/// Result of releasing a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Moved(DropTarget),
    /// The drop resolved to no movement.
    NoOp,
    /// The drag ended without a valid target; the order is unchanged.
    Aborted,
}

/// Resolves a gesture to a destination.
///
/// Returns `None` for self-drops, unknown ids, drops into the source's own
/// subtree, drops that would leave the root level empty, and drops that
/// wouldn't move the block at all.
///
/// Nesting level is picked by horizontal offset: at or beyond
/// `nest_threshold` over a container drops inside it, at or beyond
/// `-nest_threshold` over a nested block drops beside its parent.
pub fn resolve(
    repo: &BlockRepository,
    gesture: &Gesture,
    config: &ReorderConfig,
) -> Option<DropTarget> {
    if gesture.source == gesture.hovered {
        return None;
    }
    let source = repo.find_block(gesture.source).ok()?;
    let hovered = repo.find_block(gesture.hovered).ok()?;
    let position = gesture.position();

    let target = if hovered.is_container() && gesture.offset_x >= config.nest_threshold {
        let remaining = hovered
            .children()
            .iter()
            .filter(|&&id| id != gesture.source)
            .count();
        DropTarget {
            parent: Some(gesture.hovered),
            index: match position {
                DropPosition::Above => 0,
                DropPosition::Below => remaining,
            },
        }
    } else {
        let anchor = match hovered.parent() {
            Some(parent) if gesture.offset_x <= -config.nest_threshold => parent,
            _ => gesture.hovered,
        };
        beside(repo, gesture.source, anchor, position)?
    };

    if let Some(parent) = target.parent {
        if parent == gesture.source || repo.is_ancestor(gesture.source, parent) {
            return None;
        }
    }
    if source.parent().is_none() && target.parent.is_some() && repo.root().len() == 1 {
        return None;
    }

    let (current_parent, current_index) = repo.locate(gesture.source).ok()?;
    if current_parent == target.parent && current_index == target.index {
        return None;
    }
    Some(target)
}

/// Target right above or below `anchor`, in the anchor's own sequence.
fn beside(
    repo: &BlockRepository,
    source: BlockId,
    anchor: BlockId,
    position: DropPosition,
) -> Option<DropTarget> {
    if anchor == source {
        return None;
    }
    let parent = repo.find_block(anchor).ok()?.parent();
    let index = repo
        .order(parent)
        .ok()?
        .iter()
        .filter(|&&id| id != source)
        .position(|&id| id == anchor)?;

    Some(DropTarget {
        parent,
        index: match position {
            DropPosition::Above => index,
            DropPosition::Below => index + 1,
        },
    })
}

/// Resolves and commits a gesture in one step.
pub fn apply_drop(
    repo: &mut BlockRepository,
    gesture: &Gesture,
    config: &ReorderConfig,
) -> CoreResult<DropOutcome> {
    if !repo.contains(gesture.source) || !repo.contains(gesture.hovered) {
        tracing::warn!(
            source = %gesture.source,
            hovered = %gesture.hovered,
            "drop target vanished, aborting drag"
        );
        return Ok(DropOutcome::Aborted);
    }

    match resolve(repo, gesture, config) {
        Some(target) => {
            repo.move_block(gesture.source, target.parent, target.index)?;
            Ok(DropOutcome::Moved(target))
        }
        None => Ok(DropOutcome::NoOp),
    }
}

/// An in-progress drag.
///
/// Holds only the latest pointer state; the repository is untouched until
/// [`DragSession::finish`].
#[derive(Debug, Clone)]
pub struct DragSession {
    source: BlockId,
    origin: (Option<BlockId>, usize),
    gesture: Option<Gesture>,
}

impl DragSession {
    /// Starts dragging `source`.
    pub fn begin(repo: &BlockRepository, source: BlockId) -> CoreResult<Self> {
        let origin = repo.locate(source)?;
        tracing::debug!(%source, "drag started");
        Ok(Self {
            source,
            origin,
            gesture: None,
        })
    }

    pub fn source(&self) -> BlockId {
        self.source
    }

    /// The source's parent and index when the drag started.
    pub fn origin(&self) -> (Option<BlockId>, usize) {
        self.origin
    }

    /// Records the pointer hovering `hovered`.
    pub fn hover(&mut self, hovered: BlockId, offset_x: f32, offset_y: f32, height: f32) {
        self.gesture = Some(Gesture::new(self.source, hovered).at(offset_x, offset_y, height));
    }

    /// Clears the hover state (pointer left every valid target).
    pub fn leave(&mut self) {
        self.gesture = None;
    }

    /// Returns the last recorded gesture.
    pub fn gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    /// Returns where the block would land if released now.
    pub fn preview(&self, repo: &BlockRepository, config: &ReorderConfig) -> Option<DropTarget> {
        resolve(repo, self.gesture.as_ref()?, config)
    }

    /// Releases the drag, committing the move if it resolves to one.
    pub fn finish(
        self,
        repo: &mut BlockRepository,
        config: &ReorderConfig,
    ) -> CoreResult<DropOutcome> {
        match self.gesture {
            Some(gesture) => apply_drop(repo, &gesture, config),
            None => {
                tracing::debug!(source = %self.source, "drag released off target");
                Ok(DropOutcome::Aborted)
            }
        }
    }
}
