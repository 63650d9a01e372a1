//! The focus coordinator: which block is active and where its cursor goes.
//!
//! The cursor is stored as an *intent* ("start", "end", "offset 5") rather
//! than a resolved position, so it survives structural edits and is only
//! resolved against the block's content when someone asks for it.

use blockwise_markup::visible_len;
use blockwise_model::{BlockId, BlockRepository};

use crate::{CoreError, CoreResult};

/// Logical cursor placement within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorIntent {
    #[default]
    Start,
    End,
    /// Visible-unit offset, clamped to the content length.
    Offset(usize),
}

impl CursorIntent {
    /// Resolves the intent to a visible offset within `content`.
    pub fn resolve(&self, content: &str) -> usize {
        match *self {
            CursorIntent::Start => 0,
            CursorIntent::End => visible_len(content),
            CursorIntent::Offset(offset) => offset.min(visible_len(content)),
        }
    }
}

/// Holds the single active block.
#[derive(Debug, Clone, Default)]
pub struct FocusCoordinator {
    active: Option<BlockId>,
    cursor: CursorIntent,
}

impl FocusCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the active block, if any.
    pub fn active(&self) -> Option<BlockId> {
        self.active
    }

    /// Returns the stored cursor intent.
    pub fn cursor(&self) -> CursorIntent {
        self.cursor
    }

    /// Makes `id` the active block.
    ///
    /// This is the only mutator; it refuses ids missing from `repo` so the
    /// coordinator never points at a deleted block.
    pub fn set_active(
        &mut self,
        repo: &BlockRepository,
        id: BlockId,
        cursor: CursorIntent,
    ) -> CoreResult<()> {
        repo.find_block(id)?;
        self.active = Some(id);
        self.cursor = cursor;
        tracing::trace!(%id, ?cursor, "focus moved");
        Ok(())
    }

    /// Returns true if `id` is the active block.
    pub fn is_active(&self, id: BlockId) -> bool {
        self.active == Some(id)
    }

    /// Resolves the cursor intent against the active block's content.
    pub fn resolved_offset(&self, repo: &BlockRepository) -> Option<usize> {
        let block = repo.find_block(self.active?).ok()?;
        Some(self.cursor.resolve(block.content()))
    }

    pub(crate) fn clear(&mut self) {
        self.active = None;
        self.cursor = CursorIntent::Start;
    }
}

/// Picks the block that should take focus once `removed` (and its subtree)
/// is deleted.
///
/// The previous sibling wins, then the next sibling, then the parent. A
/// candidate that is a layout container can't hold a cursor, so the nearest
/// focusable block in reading order on that side is used instead. Returns
/// `None` when no other focusable block exists.
pub(crate) fn focus_survivor(
    repo: &BlockRepository,
    removed: BlockId,
) -> CoreResult<Option<BlockId>> {
    let focusable = |id: &BlockId| {
        repo.find_block(*id)
            .is_ok_and(|block| block.block_type().is_focusable())
    };

    let previous = repo.previous_sibling(removed)?;
    let next = repo.next_sibling(removed)?;
    let parent = repo.find_block(removed)?.parent();
    let candidate = previous.or(next).or(parent);
    if let Some(candidate) = candidate.filter(|id| focusable(id)) {
        return Ok(Some(candidate));
    }

    let order = repo.document_order();
    let start = order
        .iter()
        .position(|&id| id == removed)
        .ok_or(CoreError::NotFound(removed))?;
    let end = start + repo.subtree(removed)?.len();
    let before = order[..start].iter().rev().find(|id| focusable(id)).copied();
    let after = order[end..].iter().find(|id| focusable(id)).copied();

    Ok(if previous.is_none() && next.is_some() {
        after.or(before)
    } else {
        before.or(after)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwise_model::{BlockType, Placement};

    #[test]
    fn test_cursor_intent_resolution() {
        assert_eq!(CursorIntent::Start.resolve("Hello"), 0);
        assert_eq!(CursorIntent::End.resolve("He<em>llo</em>"), 5);
        assert_eq!(CursorIntent::Offset(3).resolve("Hello"), 3);
        assert_eq!(CursorIntent::Offset(30).resolve("Hello"), 5);
    }

    #[test]
    fn test_set_active_rejects_unknown_block() {
        let repo = BlockRepository::new("Doc");
        let mut focus = FocusCoordinator::new();
        let first = repo.root()[0];

        focus.set_active(&repo, first, CursorIntent::End).unwrap();
        assert!(focus.is_active(first));

        let ghost = BlockId::new();
        let err = focus.set_active(&repo, ghost, CursorIntent::Start).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(id) if id == ghost));
        assert_eq!(focus.active(), Some(first));
        assert_eq!(focus.cursor(), CursorIntent::End);
    }

    #[test]
    fn test_survivor_skips_layout_containers() {
        let mut repo = BlockRepository::new("Doc");
        let top = repo.root()[0];
        let columns = repo
            .insert_block(top, BlockType::Columns, "", Placement::After)
            .unwrap();
        let inner = repo.append_child(columns, BlockType::Paragraph, "inner").unwrap();
        let empty = repo
            .insert_block(columns, BlockType::Paragraph, "", Placement::After)
            .unwrap();

        assert_eq!(focus_survivor(&repo, empty).unwrap(), Some(inner));
        assert_eq!(focus_survivor(&repo, columns).unwrap(), Some(top));
        assert_eq!(focus_survivor(&repo, top).unwrap(), Some(inner));
    }

    #[test]
    fn test_survivor_prefers_focusable_sibling() {
        let mut repo = BlockRepository::new("Doc");
        let toggle = repo.root()[0];
        repo.convert_block(toggle, BlockType::Toggle).unwrap();
        repo.append_child(toggle, BlockType::Paragraph, "child").unwrap();
        let after = repo
            .insert_block(toggle, BlockType::Paragraph, "", Placement::After)
            .unwrap();

        assert_eq!(focus_survivor(&repo, after).unwrap(), Some(toggle));
    }

    #[test]
    fn test_survivor_of_only_block_is_none() {
        let repo = BlockRepository::new("Doc");
        assert_eq!(focus_survivor(&repo, repo.root()[0]).unwrap(), None);
    }
}
