//! Change notifications for rendering collaborators.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Instead of registering callbacks that hold references into the editor,
//! subscribers receive cloned event values over `tokio::sync::broadcast`:
//! - No object references to manage
//! - Events are values, not callbacks
//! - A slow subscriber lags instead of blocking the editor

use blockwise_model::{BlockId, DocumentId};
use tokio::sync::broadcast;

/// Events emitted after each committed change.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// A document was opened (created or loaded)
    DocumentOpened(DocumentId),
    /// The open document was closed
    DocumentClosed(DocumentId),
    /// Blocks were inserted, removed, moved or edited
    BlocksChanged {
        document: DocumentId,
        affected: Vec<BlockId>,
    },
    /// The active block or cursor intent changed
    FocusChanged { block: BlockId, offset: usize },
    /// The document was written to storage
    DocumentSaved(DocumentId),
    /// Writing the document failed; the in-memory tree is unchanged
    SaveFailed { document: DocumentId, reason: String },
    /// Configuration changed
    ConfigChanged,
}

/// Event bus for broadcasting editor events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: EditorEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper for consuming events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(editor.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let EditorEvent::BlocksChanged { affected, .. } = event {
///             // re-render only `affected`
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<EditorEvent>,
}

impl EventHandler {
    pub fn new(receiver: broadcast::Receiver<EditorEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event, skipping over any lagged gap.
    pub async fn next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already-queued event without waiting.
    pub fn try_next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(EditorEvent::ConfigChanged);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, EditorEvent::ConfigChanged));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_see_affected_ids() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let id = BlockId::new();

        bus.emit(EditorEvent::BlocksChanged {
            document: DocumentId::new(),
            affected: vec![id],
        });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                EditorEvent::BlocksChanged { affected, .. } => assert_eq!(affected, vec![id]),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_try_next_drains_queue() {
        let bus = EventBus::new();
        let mut handler = EventHandler::new(bus.subscribe());
        bus.emit(EditorEvent::ConfigChanged);
        assert_eq!(handler.try_next(), Some(EditorEvent::ConfigChanged));
        assert_eq!(handler.try_next(), None);
    }
}
