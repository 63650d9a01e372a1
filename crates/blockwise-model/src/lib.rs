//! # Blockwise Model
//!
//! The block document data model: blocks, documents, and the repository that
//! owns a document's block tree.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Ownership & Borrowing
//! - `BlockRepository` owns every `Block` in a flat arena
//! - Queries like `find_block()` return borrowed references (`&Block`)
//! - Mutations require `&mut self`, so no reader can observe a half-applied edit
//!
//! ### No Reference Cycles
//! - Parents and children refer to each other by `BlockId`, not by pointer
//! - Moving a block into its own subtree is rejected before anything changes

mod block;
mod document;
mod record;
mod repository;

pub use block::{keys, Block, BlockId, BlockType, PatchValue, Properties, PropertyPatch};
pub use document::{Document, DocumentId};
pub use record::{BlockRecord, DocumentRecord};
pub use repository::{BlockRepository, Placement};

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur during model operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Block not found: {0}")]
    NotFound(BlockId),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
