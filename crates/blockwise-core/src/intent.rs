//! Structural editing intents and their interpreter.
//!
//! ## Learning: The Command Pattern
//!
//! Key presses are translated into `Intent` values before anything happens:
//! - Intents are plain data, so they can be bound, logged and tested
//! - The interpreter is a single `match` over the intent
//! - It owns no content; it only calls repository operations and then
//!   tells the focus coordinator where the cursor goes
//!
//! Every branch either applies completely or returns `NoOp` before touching
//! the tree, so a rejected intent never leaves a half-done edit behind.

use blockwise_markup::{insert_at, line_breaks, split_at, visible_len};
use blockwise_model::{BlockId, BlockRepository, BlockType, Placement};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config::EditorConfig;
use crate::focus::{focus_survivor, CursorIntent, FocusCoordinator};
use crate::{CoreError, CoreResult};

/// A discrete editing intent derived from key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Partition the block at the cursor (Enter)
    Split,
    /// Insert a line break without leaving the block (Shift+Enter)
    SoftBreak,
    /// Merge into the previous block, or delete an empty one
    Backspace,
    /// Nest under the preceding sibling (Tab)
    Indent,
    /// Move out to the parent's level (Shift+Tab)
    Outdent,
    NavigateUp,
    NavigateDown,
}

impl Intent {
    pub const ALL: [Intent; 7] = [
        Intent::Split,
        Intent::SoftBreak,
        Intent::Backspace,
        Intent::Indent,
        Intent::Outdent,
        Intent::NavigateUp,
        Intent::NavigateDown,
    ];

    /// Returns the name used in key binding configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Split => "split",
            Intent::SoftBreak => "soft_break",
            Intent::Backspace => "backspace",
            Intent::Indent => "indent",
            Intent::Outdent => "outdent",
            Intent::NavigateUp => "navigate_up",
            Intent::NavigateDown => "navigate_down",
        }
    }

    /// Returns the display name for the intent.
    pub fn display_name(&self) -> &'static str {
        match self {
            Intent::Split => "Split Block",
            Intent::SoftBreak => "Soft Break",
            Intent::Backspace => "Merge or Delete Block",
            Intent::Indent => "Indent",
            Intent::Outdent => "Outdent",
            Intent::NavigateUp => "Previous Block",
            Intent::NavigateDown => "Next Block",
        }
    }
}

impl FromStr for Intent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '.'], "_");
        Intent::ALL
            .iter()
            .find(|intent| intent.name() == normalized)
            .copied()
            .ok_or_else(|| CoreError::InvariantViolation(format!("unknown intent: {s}")))
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An intent addressed to a block by the editable surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub target: BlockId,
    pub intent: Intent,
    /// Cursor position in visible units.
    pub offset: usize,
    /// The surface's uncommitted buffer, committed before the intent runs.
    pub buffer: Option<String>,
}

impl IntentRequest {
    pub fn new(target: BlockId, intent: Intent) -> Self {
        Self {
            target,
            intent,
            offset: 0,
            buffer: None,
        }
    }

    /// Sets the cursor offset.
    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Attaches the surface buffer.
    pub fn with_buffer(mut self, buffer: impl Into<String>) -> Self {
        self.buffer = Some(buffer.into());
        self
    }
}

/// What an intent did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// The tree changed; `affected` lists blocks to re-render.
    Applied { affected: Vec<BlockId> },
    /// Only the active block changed.
    FocusMoved(BlockId),
    /// Preconditions didn't hold; nothing changed.
    NoOp,
    /// The target wasn't the active block; nothing changed.
    Ignored,
}

impl IntentOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, IntentOutcome::Applied { .. })
    }
}

/// Runs `intent` against `target`, which must be the active block.
pub(crate) fn dispatch(
    repo: &mut BlockRepository,
    focus: &mut FocusCoordinator,
    config: &EditorConfig,
    target: BlockId,
    intent: Intent,
    offset: usize,
) -> CoreResult<IntentOutcome> {
    let outcome = match intent {
        Intent::Split => split(repo, focus, config, target, offset)?,
        Intent::SoftBreak => soft_break(repo, focus, config, target, offset)?,
        Intent::Backspace => backspace(repo, focus, target, offset)?,
        Intent::Indent => indent(repo, target)?,
        Intent::Outdent => outdent(repo, target)?,
        Intent::NavigateUp => navigate(repo, focus, target, offset, Direction::Up)?,
        Intent::NavigateDown => navigate(repo, focus, target, offset, Direction::Down)?,
    };
    tracing::debug!(%target, ?intent, offset, ?outcome, "intent resolved");
    Ok(outcome)
}

// ==================== Content Intents ====================

fn split(
    repo: &mut BlockRepository,
    focus: &mut FocusCoordinator,
    config: &EditorConfig,
    target: BlockId,
    offset: usize,
) -> CoreResult<IntentOutcome> {
    let block = repo.find_block(target)?;
    if !block.is_text_bearing() {
        return Ok(IntentOutcome::NoOp);
    }
    let kind = config.split_successor(block.block_type());
    let (left, right) = split_at(block.content(), offset);

    repo.update_content(target, left)?;
    let created = repo.insert_block(target, kind, right, Placement::After)?;
    focus.set_active(repo, created, CursorIntent::Start)?;

    Ok(IntentOutcome::Applied {
        affected: vec![target, created],
    })
}

fn soft_break(
    repo: &mut BlockRepository,
    focus: &mut FocusCoordinator,
    config: &EditorConfig,
    target: BlockId,
    offset: usize,
) -> CoreResult<IntentOutcome> {
    let block = repo.find_block(target)?;
    if !block.is_text_bearing() {
        return Ok(IntentOutcome::NoOp);
    }
    let offset = offset.min(visible_len(block.content()));
    let content = insert_at(block.content(), offset, &config.soft_break_marker);

    repo.update_content(target, content)?;
    focus.set_active(repo, target, CursorIntent::Offset(offset + 1))?;

    Ok(IntentOutcome::Applied {
        affected: vec![target],
    })
}

/// Backspace at the start of a block merges it into its predecessor; on an
/// empty block it deletes it. Character deletion belongs to the surface.
fn backspace(
    repo: &mut BlockRepository,
    focus: &mut FocusCoordinator,
    target: BlockId,
    offset: usize,
) -> CoreResult<IntentOutcome> {
    let block = repo.find_block(target)?;
    if visible_len(block.content()) == 0 {
        delete_empty(repo, focus, target)
    } else if offset == 0 {
        merge_backward(repo, focus, target)
    } else {
        Ok(IntentOutcome::NoOp)
    }
}

fn merge_backward(
    repo: &mut BlockRepository,
    focus: &mut FocusCoordinator,
    target: BlockId,
) -> CoreResult<IntentOutcome> {
    let Some(previous) = repo.previous_sibling(target)? else {
        return Ok(IntentOutcome::NoOp);
    };
    let current = repo.find_block(target)?;
    let prev = repo.find_block(previous)?;
    if !prev.is_text_bearing() || !current.children().is_empty() {
        return Ok(IntentOutcome::NoOp);
    }

    let anchor = visible_len(prev.content());
    let merged = format!("{}{}", prev.content(), current.content());

    repo.update_content(previous, merged)?;
    repo.delete_block(target)?;
    focus.set_active(repo, previous, CursorIntent::Offset(anchor))?;

    Ok(IntentOutcome::Applied {
        affected: vec![previous, target],
    })
}

fn delete_empty(
    repo: &mut BlockRepository,
    focus: &mut FocusCoordinator,
    target: BlockId,
) -> CoreResult<IntentOutcome> {
    let block = repo.find_block(target)?;
    if !block.children().is_empty() {
        return Ok(IntentOutcome::NoOp);
    }
    let parent = block.parent();
    if parent.is_none() && repo.root().len() == 1 {
        return Ok(IntentOutcome::NoOp);
    }

    let Some(survivor) = focus_survivor(repo, target)? else {
        return Ok(IntentOutcome::NoOp);
    };

    let mut affected = repo.delete_block(target)?;
    focus.set_active(repo, survivor, CursorIntent::End)?;
    affected.push(survivor);

    Ok(IntentOutcome::Applied { affected })
}

// ==================== Structural Intents ====================

/// Nests the block as the last child of its preceding sibling. A text-bearing
/// sibling is turned into a toggle to hold it.
fn indent(repo: &mut BlockRepository, target: BlockId) -> CoreResult<IntentOutcome> {
    let Some(previous) = repo.previous_sibling(target)? else {
        return Ok(IntentOutcome::NoOp);
    };
    let prev = repo.find_block(previous)?;
    let index = prev.children().len();

    if !prev.is_container() {
        if !prev.is_text_bearing() {
            return Ok(IntentOutcome::NoOp);
        }
        repo.convert_block(previous, BlockType::Toggle)?;
    }
    repo.move_block(target, Some(previous), index)?;

    Ok(IntentOutcome::Applied {
        affected: vec![previous, target],
    })
}

/// Moves the block to sit right after its former parent.
fn outdent(repo: &mut BlockRepository, target: BlockId) -> CoreResult<IntentOutcome> {
    let Some(parent) = repo.find_block(target)?.parent() else {
        return Ok(IntentOutcome::NoOp);
    };
    let (grandparent, index) = repo.locate(parent)?;
    repo.move_block(target, grandparent, index + 1)?;

    Ok(IntentOutcome::Applied {
        affected: vec![parent, target],
    })
}

// ==================== Navigation ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// Moves focus to the neighbouring block in reading order, but only when the
/// cursor sits on the first (up) or last (down) line of the block.
fn navigate(
    repo: &BlockRepository,
    focus: &mut FocusCoordinator,
    target: BlockId,
    offset: usize,
    direction: Direction,
) -> CoreResult<IntentOutcome> {
    let breaks = line_breaks(repo.find_block(target)?.content());
    let at_edge = match direction {
        Direction::Up => breaks.iter().all(|&b| b >= offset),
        Direction::Down => breaks.iter().all(|&b| b < offset),
    };
    if !at_edge {
        return Ok(IntentOutcome::NoOp);
    }

    let order: Vec<BlockId> = repo
        .document_order()
        .into_iter()
        .filter(|id| {
            repo.find_block(*id)
                .map(|b| b.block_type().is_focusable())
                .unwrap_or(false)
        })
        .collect();
    let Some(position) = order.iter().position(|&id| id == target) else {
        return Ok(IntentOutcome::NoOp);
    };

    let next = match direction {
        Direction::Up => position.checked_sub(1).map(|i| (order[i], CursorIntent::End)),
        Direction::Down => order.get(position + 1).map(|&id| (id, CursorIntent::Start)),
    };
    let Some((next, cursor)) = next else {
        return Ok(IntentOutcome::NoOp);
    };

    focus.set_active(repo, next, cursor)?;
    Ok(IntentOutcome::FocusMoved(next))
}
