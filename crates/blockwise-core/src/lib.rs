//! # Blockwise Core
//!
//! Editing logic for block documents.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Editor                            │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────┐ │
//! │  │  Config  │ │  Keymap  │ │ EventBus │ │  Autosaver   │ │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────────┘ │
//! │        │                                                  │
//! │  ┌─────┴───────────── Session ─────────────────────────┐ │
//! │  │  Intent dispatch ──┐   Reorder ──┐                   │ │
//! │  │                    ▼             ▼                   │ │
//! │  │            BlockRepository ──▶ FocusCoordinator      │ │
//! │  └──────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Input collaborators call the `Editor`; the editor mutates the repository,
//! resolves the next active block, then broadcasts what changed so the
//! rendering side can re-read only the affected blocks.

pub mod config;
pub mod editor;
pub mod event;
pub mod focus;
pub mod intent;
pub mod keymap;
pub mod persistence;
pub mod reorder;

pub use config::Config;
pub use editor::{CommitOutcome, Editor};
pub use event::{EditorEvent, EventBus, EventHandler};
pub use focus::{CursorIntent, FocusCoordinator};
pub use intent::{Intent, IntentOutcome, IntentRequest};
pub use keymap::{Key, KeyPress, Keymap, Modifiers};
pub use persistence::{
    Autosaver, DocumentStore, JsonFileStore, MemoryStore, PersistenceError, PersistenceResult,
};
pub use reorder::{DragSession, DropOutcome, DropPosition, DropTarget, Gesture};

use blockwise_model::{BlockId, ModelError};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Block not found: {0}")]
    NotFound(BlockId),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("No document is open")]
    NoDocument,

    #[error("No block is active")]
    NoActiveBlock,

    #[error("No document store attached")]
    NoStore,

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<ModelError> for CoreError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound(id) => CoreError::NotFound(id),
            ModelError::InvariantViolation(msg) => CoreError::InvariantViolation(msg),
            ModelError::InvalidRecord(msg) => CoreError::Persistence(PersistenceError::Invalid(msg)),
        }
    }
}
