//! The block repository: a flat arena of blocks plus ordered id sequences.
//!
//! ## Why an Arena?
//!
//! A tree of `Rc<RefCell<Block>>` with parent back-pointers is the classic
//! way to get reference cycles and runtime borrow panics. Instead:
//! - **Blocks** live in one `HashMap<BlockId, Block>`
//! - **Order** is explicit: the document's root list and each container's
//!   `children` are plain `Vec<BlockId>`
//! - **Parents** are looked up by id, so ownership stays a simple tree
//!
//! Every mutation validates its ids up front and either applies completely
//! or returns an error without touching anything.

use std::collections::{HashMap, HashSet};

use crate::block::{keys, Block, BlockId, BlockType, PropertyPatch};
use crate::document::Document;
use crate::{ModelError, ModelResult};

/// Where a new block goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// Owns a document's block tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRepository {
    pub(crate) document: Document,
    pub(crate) blocks: HashMap<BlockId, Block>,
}

impl BlockRepository {
    /// Creates a document holding a single empty paragraph.
    pub fn new(title: impl Into<String>) -> Self {
        let mut document = Document::new(title);
        let block = Block::new(BlockType::Paragraph, "");
        document.blocks.push(block.id);

        let mut blocks = HashMap::new();
        blocks.insert(block.id, block);

        Self { document, blocks }
    }

    // ==================== Queries ====================

    /// Returns the document metadata and root order.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Returns the ordered root block ids.
    pub fn root(&self) -> &[BlockId] {
        &self.document.blocks
    }

    /// Returns the number of blocks in the arena.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    /// Looks up a block by id.
    pub fn find_block(&self, id: BlockId) -> ModelResult<&Block> {
        self.blocks.get(&id).ok_or(ModelError::NotFound(id))
    }

    fn block_mut(&mut self, id: BlockId) -> ModelResult<&mut Block> {
        self.blocks.get_mut(&id).ok_or(ModelError::NotFound(id))
    }

    /// Iterates over every block in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Returns the order sequence owned by `parent` (the root list for `None`).
    pub fn order(&self, parent: Option<BlockId>) -> ModelResult<&[BlockId]> {
        match parent {
            None => Ok(&self.document.blocks),
            Some(id) => Ok(&self.find_block(id)?.children),
        }
    }

    fn order_mut(&mut self, parent: Option<BlockId>) -> ModelResult<&mut Vec<BlockId>> {
        match parent {
            None => Ok(&mut self.document.blocks),
            Some(id) => Ok(&mut self.block_mut(id)?.children),
        }
    }

    /// Returns a block's parent and its index in the parent's order.
    pub fn locate(&self, id: BlockId) -> ModelResult<(Option<BlockId>, usize)> {
        let parent = self.find_block(id)?.parent;
        let index = self
            .order(parent)?
            .iter()
            .position(|&b| b == id)
            .ok_or_else(|| {
                ModelError::InvariantViolation(format!(
                    "block {id} is missing from its parent's order"
                ))
            })?;
        Ok((parent, index))
    }

    /// Returns the ordered sequence that contains `id`.
    pub fn siblings(&self, id: BlockId) -> ModelResult<&[BlockId]> {
        let parent = self.find_block(id)?.parent;
        self.order(parent)
    }

    pub fn previous_sibling(&self, id: BlockId) -> ModelResult<Option<BlockId>> {
        let (parent, index) = self.locate(id)?;
        Ok(index
            .checked_sub(1)
            .and_then(|i| self.order(parent).ok()?.get(i).copied()))
    }

    pub fn next_sibling(&self, id: BlockId) -> ModelResult<Option<BlockId>> {
        let (parent, index) = self.locate(id)?;
        Ok(self.order(parent)?.get(index + 1).copied())
    }

    /// Returns true if `ancestor` appears on the parent chain of `id`.
    pub fn is_ancestor(&self, ancestor: BlockId, id: BlockId) -> bool {
        let mut current = self.blocks.get(&id).and_then(|b| b.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.blocks.get(&parent).and_then(|b| b.parent);
        }
        false
    }

    /// Returns the ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: BlockId) -> ModelResult<Vec<BlockId>> {
        let mut out = Vec::new();
        let mut current = self.find_block(id)?.parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.find_block(parent)?.parent;
        }
        Ok(out)
    }

    /// Returns the nesting depth of `id` (0 for root blocks).
    pub fn depth(&self, id: BlockId) -> ModelResult<usize> {
        Ok(self.ancestors(id)?.len())
    }

    /// Returns `id` followed by all its descendants in pre-order.
    pub fn subtree(&self, id: BlockId) -> ModelResult<Vec<BlockId>> {
        self.find_block(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(block) = self.blocks.get(&next) {
                stack.extend(block.children.iter().rev());
            }
        }
        Ok(out)
    }

    /// Returns every block id in reading (pre-order) order.
    pub fn document_order(&self) -> Vec<BlockId> {
        let mut out = Vec::with_capacity(self.blocks.len());
        let mut stack: Vec<BlockId> = self.document.blocks.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(block) = self.blocks.get(&id) {
                stack.extend(block.children.iter().rev());
            }
        }
        out
    }

    // ==================== Mutations ====================

    /// Sets the document title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.document.title = title.into();
        self.document.touch();
    }

    /// Inserts a new block next to `anchor`, in the anchor's own sequence.
    ///
    /// The new block starts with no properties. Content is dropped for types
    /// that carry none.
    pub fn insert_block(
        &mut self,
        anchor: BlockId,
        kind: BlockType,
        content: impl Into<String>,
        placement: Placement,
    ) -> ModelResult<BlockId> {
        let (parent, index) = self.locate(anchor)?;
        let at = match placement {
            Placement::Before => index,
            Placement::After => index + 1,
        };

        let content = if kind.is_text_bearing() {
            content.into()
        } else {
            String::new()
        };
        let mut block = Block::new(kind, content);
        block.parent = parent;
        let id = block.id;

        self.order_mut(parent)?.insert(at, id);
        self.blocks.insert(id, block);
        self.document.touch();

        tracing::debug!(%id, %anchor, ?placement, %kind, "inserted block");
        Ok(id)
    }

    /// Appends a new block as the last child of a container.
    pub fn append_child(
        &mut self,
        parent: BlockId,
        kind: BlockType,
        content: impl Into<String>,
    ) -> ModelResult<BlockId> {
        if !self.find_block(parent)?.is_container() {
            return Err(ModelError::InvariantViolation(format!(
                "block {parent} is not a container"
            )));
        }

        let content = if kind.is_text_bearing() {
            content.into()
        } else {
            String::new()
        };
        let mut block = Block::new(kind, content);
        block.parent = Some(parent);
        let id = block.id;

        self.block_mut(parent)?.children.push(id);
        self.blocks.insert(id, block);
        self.document.touch();

        tracing::debug!(%id, %parent, %kind, "appended child block");
        Ok(id)
    }

    /// Deletes a block and, for containers, its whole subtree.
    ///
    /// Returns the ids that were removed. The last root block can never be
    /// deleted.
    pub fn delete_block(&mut self, id: BlockId) -> ModelResult<Vec<BlockId>> {
        let (parent, index) = self.locate(id)?;
        if parent.is_none() && self.document.blocks.len() == 1 {
            return Err(ModelError::InvariantViolation(
                "cannot delete the last root block".to_string(),
            ));
        }

        let removed = self.subtree(id)?;
        self.order_mut(parent)?.remove(index);
        for block in &removed {
            self.blocks.remove(block);
        }
        self.document.touch();

        tracing::debug!(%id, removed = removed.len(), "deleted block");
        Ok(removed)
    }

    /// Moves a block to `index` within `destination` (the root list for `None`).
    ///
    /// The index refers to the destination sequence after the block has been
    /// taken out of its current position, and is clamped to its length.
    pub fn move_block(
        &mut self,
        id: BlockId,
        destination: Option<BlockId>,
        index: usize,
    ) -> ModelResult<()> {
        let (source_parent, source_index) = self.locate(id)?;

        if let Some(dest) = destination {
            let is_container = self.find_block(dest)?.is_container();
            if dest == id || self.is_ancestor(id, dest) {
                return Err(ModelError::InvariantViolation(format!(
                    "cannot move block {id} into its own subtree"
                )));
            }
            if !is_container {
                return Err(ModelError::InvariantViolation(format!(
                    "block {dest} is not a container"
                )));
            }
        }

        if source_parent.is_none() && destination.is_some() && self.document.blocks.len() == 1 {
            return Err(ModelError::InvariantViolation(
                "cannot move the last root block out of the root level".to_string(),
            ));
        }

        self.order_mut(source_parent)?.remove(source_index);
        let order = self.order_mut(destination)?;
        let at = index.min(order.len());
        order.insert(at, id);
        self.block_mut(id)?.parent = destination;
        self.document.touch();

        tracing::debug!(%id, ?destination, index = at, "moved block");
        Ok(())
    }

    /// Replaces a block's content.
    pub fn update_content(&mut self, id: BlockId, content: impl Into<String>) -> ModelResult<()> {
        let block = self.block_mut(id)?;
        if !block.is_text_bearing() {
            return Err(ModelError::InvariantViolation(format!(
                "block {id} ({}) carries no content",
                block.kind
            )));
        }
        block.content = content.into();
        self.document.touch();
        Ok(())
    }

    /// Shallow-merges `patch` into a block's properties.
    pub fn update_properties(&mut self, id: BlockId, patch: &PropertyPatch) -> ModelResult<()> {
        let block = self.block_mut(id)?;

        let mut properties = block.properties.clone();
        patch.apply_to(&mut properties);
        if let Some(checked) = properties.get(keys::CHECKED) {
            if block.kind != BlockType::Task {
                return Err(ModelError::InvariantViolation(format!(
                    "`checked` only applies to tasks, block {id} is a {}",
                    block.kind
                )));
            }
            if !checked.is_boolean() {
                return Err(ModelError::InvariantViolation(
                    "`checked` must be a boolean".to_string(),
                ));
            }
        }

        block.properties = properties;
        self.document.touch();
        Ok(())
    }

    /// Changes a block's type.
    ///
    /// A container that still has children can't become a leaf. Leaving the
    /// task type drops `checked`, and types without content lose theirs.
    pub fn convert_block(&mut self, id: BlockId, kind: BlockType) -> ModelResult<()> {
        let block = self.block_mut(id)?;
        if !block.children.is_empty() && !kind.is_container() {
            return Err(ModelError::InvariantViolation(format!(
                "block {id} has children and can't become a {kind}"
            )));
        }

        block.kind = kind;
        if kind != BlockType::Task {
            block.properties.remove(keys::CHECKED);
        }
        if !kind.is_text_bearing() {
            block.content.clear();
        }
        self.document.touch();

        tracing::debug!(%id, %kind, "converted block");
        Ok(())
    }

    /// Copies a block (and its subtree) right after the original.
    ///
    /// Every copied block gets a fresh id.
    pub fn duplicate_block(&mut self, id: BlockId) -> ModelResult<BlockId> {
        let (parent, index) = self.locate(id)?;
        let copy = self.clone_subtree(id, parent)?;
        self.order_mut(parent)?.insert(index + 1, copy);
        self.document.touch();

        tracing::debug!(%id, %copy, "duplicated block");
        Ok(copy)
    }

    fn clone_subtree(&mut self, id: BlockId, parent: Option<BlockId>) -> ModelResult<BlockId> {
        let source = self.find_block(id)?.clone();
        let new_id = BlockId::new();

        let mut children = Vec::with_capacity(source.children.len());
        for child in &source.children {
            children.push(self.clone_subtree(*child, Some(new_id))?);
        }

        self.blocks.insert(
            new_id,
            Block {
                id: new_id,
                parent,
                children,
                ..source
            },
        );
        Ok(new_id)
    }

    // ==================== Validation ====================

    /// Checks every structural invariant of the tree.
    pub fn validate(&self) -> ModelResult<()> {
        if self.document.blocks.is_empty() {
            return Err(ModelError::InvariantViolation(
                "document has no root blocks".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.blocks.len());
        let mut stack: Vec<(Option<BlockId>, BlockId)> = self
            .document
            .blocks
            .iter()
            .rev()
            .map(|&id| (None, id))
            .collect();

        while let Some((parent, id)) = stack.pop() {
            if !seen.insert(id) {
                return Err(ModelError::InvariantViolation(format!(
                    "block {id} is listed more than once"
                )));
            }
            let block = self.blocks.get(&id).ok_or_else(|| {
                ModelError::InvariantViolation(format!("order references missing block {id}"))
            })?;
            if block.id != id {
                return Err(ModelError::InvariantViolation(format!(
                    "arena key {id} holds block {}",
                    block.id
                )));
            }
            if block.parent != parent {
                return Err(ModelError::InvariantViolation(format!(
                    "block {id} has a stale parent link"
                )));
            }
            if !block.is_container() && !block.children.is_empty() {
                return Err(ModelError::InvariantViolation(format!(
                    "leaf block {id} lists children"
                )));
            }
            stack.extend(block.children.iter().rev().map(|&child| (Some(id), child)));
        }

        if seen.len() != self.blocks.len() {
            return Err(ModelError::InvariantViolation(format!(
                "{} blocks are not reachable from the document",
                self.blocks.len() - seen.len()
            )));
        }
        Ok(())
    }
}
