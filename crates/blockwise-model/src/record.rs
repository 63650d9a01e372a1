//! Persisted record shapes.
//!
//! The on-disk form is a nested JSON tree rather than the arena:
//!
//! ```json
//! { "id": "…", "type": "columns", "content": "", "properties": {},
//!   "children": [ { "id": "…", "type": "paragraph", "content": "Hi", "properties": {} } ] }
//! ```
//!
//! `children` is present only on container types; absence means a leaf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::block::{Block, BlockId, BlockType, Properties};
use crate::document::{Document, DocumentId};
use crate::repository::BlockRepository;
use crate::{ModelError, ModelResult};

/// A block as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BlockRecord>>,
}

/// A document as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub title: String,
    pub blocks: Vec<BlockRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlockRepository {
    /// Builds the nested persisted form of the document.
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            id: self.document.id,
            title: self.document.title.clone(),
            blocks: self
                .document
                .blocks
                .iter()
                .filter_map(|id| self.block_record(*id))
                .collect(),
            created_at: self.document.created_at,
            updated_at: self.document.updated_at,
        }
    }

    fn block_record(&self, id: BlockId) -> Option<BlockRecord> {
        let block = self.blocks.get(&id)?;
        let children = block.is_container().then(|| {
            block
                .children
                .iter()
                .filter_map(|child| self.block_record(*child))
                .collect()
        });
        Some(BlockRecord {
            id,
            kind: block.kind,
            content: block.content.clone(),
            properties: block.properties.clone(),
            children,
        })
    }

    /// Rebuilds a repository from its persisted form.
    ///
    /// Duplicate ids and children on leaf types are rejected. A record with
    /// no root blocks gets a fresh empty paragraph.
    pub fn from_record(record: DocumentRecord) -> ModelResult<Self> {
        let mut document = Document {
            id: record.id,
            title: record.title,
            blocks: Vec::with_capacity(record.blocks.len()),
            created_at: record.created_at,
            updated_at: record.updated_at,
        };
        let mut blocks = HashMap::new();
        let mut seen = HashSet::new();

        for block in record.blocks {
            let id = flatten(block, None, &mut blocks, &mut seen)?;
            document.blocks.push(id);
        }

        if document.blocks.is_empty() {
            tracing::warn!(document = %document.id, "record has no blocks, adding an empty paragraph");
            let block = Block::new(BlockType::Paragraph, "");
            document.blocks.push(block.id);
            blocks.insert(block.id, block);
        }

        let repo = Self { document, blocks };
        repo.validate()?;
        Ok(repo)
    }
}

fn flatten(
    record: BlockRecord,
    parent: Option<BlockId>,
    blocks: &mut HashMap<BlockId, Block>,
    seen: &mut HashSet<BlockId>,
) -> ModelResult<BlockId> {
    let id = record.id;
    if !seen.insert(id) {
        return Err(ModelError::InvalidRecord(format!("duplicate block id {id}")));
    }

    let child_records = match record.children {
        Some(children) if !record.kind.is_container() && !children.is_empty() => {
            return Err(ModelError::InvalidRecord(format!(
                "block {id} of type {} can't have children",
                record.kind
            )));
        }
        Some(children) => children,
        None => Vec::new(),
    };

    let mut children = Vec::with_capacity(child_records.len());
    for child in child_records {
        children.push(flatten(child, Some(id), blocks, seen)?);
    }

    blocks.insert(
        id,
        Block {
            id,
            kind: record.kind,
            content: record.content,
            properties: record.properties,
            parent,
            children,
        },
    );
    Ok(id)
}
