//! Blocks, block types and block properties.
//!
//! ## Learning: Newtypes for IDs
//!
//! `BlockId` wraps a `Uuid` instead of exposing it directly:
//! - Type safety: a `BlockId` can't be passed where a `DocumentId` is expected
//! - Encapsulation: the representation can change without breaking callers
//! - `#[serde(transparent)]` keeps the persisted form a plain string

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::ModelError;

/// Unique, stable identifier for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Uuid);

impl BlockId {
    /// Creates a new unique block ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlockId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Task,
    Quote,
    BulletItem,
    NumberedItem,
    Code,
    Divider,
    /// Collapsible text block that owns nested children.
    Toggle,
    Columns,
    Tabs,
}

impl BlockType {
    /// All block types, in toolbar order.
    pub const ALL: [BlockType; 13] = [
        BlockType::Paragraph,
        BlockType::Heading1,
        BlockType::Heading2,
        BlockType::Heading3,
        BlockType::Task,
        BlockType::Quote,
        BlockType::BulletItem,
        BlockType::NumberedItem,
        BlockType::Code,
        BlockType::Divider,
        BlockType::Toggle,
        BlockType::Columns,
        BlockType::Tabs,
    ];

    /// Returns the persisted name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "paragraph",
            BlockType::Heading1 => "heading1",
            BlockType::Heading2 => "heading2",
            BlockType::Heading3 => "heading3",
            BlockType::Task => "task",
            BlockType::Quote => "quote",
            BlockType::BulletItem => "bullet_item",
            BlockType::NumberedItem => "numbered_item",
            BlockType::Code => "code",
            BlockType::Divider => "divider",
            BlockType::Toggle => "toggle",
            BlockType::Columns => "columns",
            BlockType::Tabs => "tabs",
        }
    }

    /// Returns true if blocks of this type own an ordered list of children.
    pub fn is_container(&self) -> bool {
        matches!(self, BlockType::Toggle | BlockType::Columns | BlockType::Tabs)
    }

    /// Returns true if blocks of this type carry editable content.
    pub fn is_text_bearing(&self) -> bool {
        !matches!(
            self,
            BlockType::Divider | BlockType::Columns | BlockType::Tabs
        )
    }

    /// Returns true if keyboard navigation stops on blocks of this type.
    ///
    /// Layout containers are skipped; their children are visited instead.
    pub fn is_focusable(&self) -> bool {
        !matches!(self, BlockType::Columns | BlockType::Tabs)
    }

    /// Returns the type a block split off from this one starts as.
    pub fn split_successor(&self) -> BlockType {
        match self {
            BlockType::Task | BlockType::Quote | BlockType::Toggle => BlockType::Paragraph,
            other => *other,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ModelError::InvalidRecord(format!("unknown block type: {s}")))
    }
}

/// Block attributes such as `checked`, `color`, `background` and `align`.
pub type Properties = BTreeMap<String, Value>;

/// Well-known property keys.
pub mod keys {
    pub const CHECKED: &str = "checked";
    pub const COLOR: &str = "color";
    pub const BACKGROUND: &str = "background";
    pub const ALIGN: &str = "align";
}

/// A single entry of a property patch.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Set(Value),
    /// Removes the key.
    Unset,
}

/// A shallow patch over a block's properties.
///
/// Keys not mentioned in the patch are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyPatch {
    entries: BTreeMap<String, PatchValue>,
}

impl PropertyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), PatchValue::Set(value.into()));
        self
    }

    /// Removes `key`.
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), PatchValue::Unset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the patch to `properties`.
    pub fn apply_to(&self, properties: &mut Properties) {
        for (key, value) in &self.entries {
            match value {
                PatchValue::Set(v) => {
                    properties.insert(key.clone(), v.clone());
                }
                PatchValue::Unset => {
                    properties.remove(key);
                }
            }
        }
    }
}

/// A node of the document.
///
/// Blocks are owned by the repository's arena. The parent link is a lookup
/// key, never an owning pointer, so the structure can't form reference cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) kind: BlockType,
    pub(crate) content: String,
    pub(crate) properties: Properties,
    pub(crate) parent: Option<BlockId>,
    /// Always empty for non-container types.
    pub(crate) children: Vec<BlockId>,
}

impl Block {
    pub(crate) fn new(kind: BlockType, content: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(),
            kind,
            content: content.into(),
            properties: Properties::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn block_type(&self) -> BlockType {
        self.kind
    }

    /// Returns the inline markup content.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns a single property value.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns the `checked` flag of a task block.
    pub fn is_checked(&self) -> bool {
        self.property(keys::CHECKED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns the parent container, or `None` for root blocks.
    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    /// Returns the ordered child ids (empty for leaves).
    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    pub fn is_text_bearing(&self) -> bool {
        self.kind.is_text_bearing()
    }
}
