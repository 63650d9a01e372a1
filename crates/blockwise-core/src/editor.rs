//! Main editor orchestration.
//!
//! ## Learning: The Facade Pattern
//!
//! `Editor` acts as a facade over the repository, the focus coordinator, the
//! intent interpreter and the reorder engine. Input collaborators only talk
//! to `Editor`; after every committed change it broadcasts which blocks were
//! affected and, if enabled, schedules a debounced autosave.
//!
//! ## Deferred Sync
//!
//! The editable surface owns its own text buffer while the user types. The
//! canonical tree only changes at checkpoints: `commit` on blur or save, or
//! the `buffer` attached to an intent request. Keystrokes never stream into
//! the tree.

use std::sync::Arc;

use blockwise_markup::{Autoformatter, FormatOutcome};
use blockwise_model::{
    keys, BlockId, BlockRepository, BlockType, DocumentId, DocumentRecord, Placement,
    PropertyPatch,
};

use crate::config::Config;
use crate::event::{EditorEvent, EventBus};
use crate::focus::{focus_survivor, CursorIntent, FocusCoordinator};
use crate::intent::{self, IntentOutcome, IntentRequest};
use crate::keymap::{KeyPress, Keymap};
use crate::persistence::{Autosaver, DocumentStore};
use crate::reorder::{self, DragSession, DropOutcome, DropTarget, Gesture};
use crate::{CoreError, CoreResult};

/// Result of committing a surface buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// The content now stored in the block.
    pub content: String,
    /// The stored content differs from what was there before.
    pub changed: bool,
    /// Autoformat rewrote the submitted buffer; the surface should reload.
    pub reformatted: bool,
}

/// State tied to one open document.
#[derive(Debug)]
struct Session {
    repo: BlockRepository,
    focus: FocusCoordinator,
    drag: Option<DragSession>,
}

/// The main editor state.
///
/// ## Thread Safety
///
/// `Editor` has a single owner and every edit takes `&mut self`, so two
/// structural edits can never interleave. Only autosave runs in the
/// background, on a snapshot of the tree.
pub struct Editor {
    /// The open document, if any
    session: Option<Session>,

    /// Editor configuration
    config: Config,

    /// Key bindings
    keymap: Keymap,

    /// Inline markdown shortcuts
    formatter: Autoformatter,

    /// Event bus for notifications
    event_bus: EventBus,

    /// Persistence collaborator
    store: Option<Arc<dyn DocumentStore>>,

    /// Debounced saver over `store`
    autosaver: Option<Autosaver>,
}

impl Editor {
    /// Creates a new editor instance.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an editor with custom configuration.
    pub fn with_config(config: Config) -> Self {
        let keymap = Keymap::from_config(&config);
        Self {
            session: None,
            config,
            keymap,
            formatter: Autoformatter::new(),
            event_bus: EventBus::new(),
            store: None,
            autosaver: None,
        }
    }

    /// Attaches a document store used for `open`, `save` and autosave.
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.attach_store(store);
        self
    }

    /// Attaches a document store, replacing any previous one.
    pub fn attach_store(&mut self, store: Arc<dyn DocumentStore>) {
        if let Some(mut previous) = self.autosaver.take() {
            previous.cancel();
        }
        self.autosaver = Some(
            Autosaver::new(Arc::clone(&store), self.config.autosave.delay())
                .with_events(self.event_bus.clone()),
        );
        self.store = Some(store);
    }

    // ==================== Document Lifecycle ====================

    /// Creates and opens a new document holding one empty paragraph.
    pub fn new_document(&mut self, title: impl Into<String>) -> CoreResult<DocumentId> {
        self.open_repository(BlockRepository::new(title))
    }

    /// Opens an existing block tree, closing the current document.
    pub fn open_repository(&mut self, repo: BlockRepository) -> CoreResult<DocumentId> {
        repo.validate()?;
        let first = repo
            .document_order()
            .into_iter()
            .find(|id| {
                repo.find_block(*id)
                    .map(|b| b.block_type().is_focusable())
                    .unwrap_or(false)
            })
            .unwrap_or(repo.root()[0]);

        let mut focus = FocusCoordinator::new();
        focus.set_active(&repo, first, CursorIntent::Start)?;

        if self.session.is_some() {
            self.close()?;
        }

        let id = repo.document().id();
        self.session = Some(Session {
            repo,
            focus,
            drag: None,
        });

        tracing::info!(document = %id, "document opened");
        self.emit(EditorEvent::DocumentOpened(id));
        self.emit_focus();
        Ok(id)
    }

    /// Loads a document from the attached store and opens it.
    ///
    /// On failure the currently open document stays open.
    pub async fn open(&mut self, id: DocumentId) -> CoreResult<DocumentId> {
        let store = self.store.clone().ok_or(CoreError::NoStore)?;
        let record = store.load(id).await?;
        let repo = BlockRepository::from_record(record)?;
        self.open_repository(repo)
    }

    /// Saves the open document now, cancelling any pending autosave.
    ///
    /// Failures are reported and returned; the in-memory tree is untouched.
    pub async fn save(&mut self) -> CoreResult<()> {
        let record = self.snapshot()?;
        let id = record.id;
        let saver = self.autosaver.as_mut().ok_or(CoreError::NoStore)?;

        match saver.flush(&record).await {
            Ok(()) => {
                tracing::info!(document = %id, "document saved");
                self.emit(EditorEvent::DocumentSaved(id));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(document = %id, error = %err, "save failed");
                self.emit(EditorEvent::SaveFailed {
                    document: id,
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Closes the open document.
    ///
    /// A pending autosave still runs, so the last edit isn't lost.
    pub fn close(&mut self) -> CoreResult<DocumentId> {
        let session = self.session.take().ok_or(CoreError::NoDocument)?;
        let id = session.repo.document().id();
        tracing::info!(document = %id, "document closed");
        self.emit(EditorEvent::DocumentClosed(id));
        Ok(id)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    // ==================== Queries ====================

    /// Returns a read-only view of the open document.
    pub fn document(&self) -> CoreResult<&BlockRepository> {
        Ok(&self.session()?.repo)
    }

    /// Returns the persisted form of the open document.
    pub fn snapshot(&self) -> CoreResult<DocumentRecord> {
        Ok(self.session()?.repo.to_record())
    }

    /// Returns the active block.
    pub fn active_block(&self) -> Option<BlockId> {
        self.session.as_ref()?.focus.active()
    }

    /// Returns the cursor intent of the active block.
    pub fn cursor(&self) -> Option<CursorIntent> {
        let session = self.session.as_ref()?;
        session.focus.active()?;
        Some(session.focus.cursor())
    }

    /// Returns the cursor resolved against the active block's content.
    pub fn cursor_offset(&self) -> Option<usize> {
        let session = self.session.as_ref()?;
        session.focus.resolved_offset(&session.repo)
    }

    // ==================== Focus ====================

    /// Moves focus to `id` (e.g. a click on the block).
    pub fn focus_block(&mut self, id: BlockId, cursor: CursorIntent) -> CoreResult<()> {
        let session = self.session_mut()?;
        session.focus.set_active(&session.repo, id, cursor)?;
        self.emit_focus();
        Ok(())
    }

    // ==================== Block Operations ====================

    /// Inserts a block before or after `anchor`.
    pub fn insert_block(
        &mut self,
        anchor: BlockId,
        kind: BlockType,
        content: impl Into<String>,
        placement: Placement,
    ) -> CoreResult<BlockId> {
        let id = self
            .session_mut()?
            .repo
            .insert_block(anchor, kind, content, placement)?;
        self.committed(vec![id]);
        Ok(id)
    }

    /// Appends a block to a container.
    pub fn append_child(
        &mut self,
        parent: BlockId,
        kind: BlockType,
        content: impl Into<String>,
    ) -> CoreResult<BlockId> {
        let id = self
            .session_mut()?
            .repo
            .append_child(parent, kind, content)?;
        self.committed(vec![parent, id]);
        Ok(id)
    }

    /// Deletes a block and its subtree.
    ///
    /// If the active block goes with it, focus moves to the nearest block in
    /// reading order that can hold a cursor.
    pub fn delete_block(&mut self, id: BlockId) -> CoreResult<Vec<BlockId>> {
        let session = self.session_mut()?;
        let survivor = focus_survivor(&session.repo, id)?;

        let removed = session.repo.delete_block(id)?;

        let lost_focus = session
            .focus
            .active()
            .is_some_and(|active| removed.contains(&active));
        if lost_focus {
            match survivor {
                Some(survivor) => {
                    session
                        .focus
                        .set_active(&session.repo, survivor, CursorIntent::End)?;
                }
                None => session.focus.clear(),
            }
        }

        self.committed(removed.clone());
        if lost_focus {
            self.emit_focus();
        }
        Ok(removed)
    }

    /// Moves a block to `index` within `parent` (the root level for `None`).
    pub fn move_block(
        &mut self,
        id: BlockId,
        parent: Option<BlockId>,
        index: usize,
    ) -> CoreResult<()> {
        self.session_mut()?.repo.move_block(id, parent, index)?;
        self.committed(vec![id]);
        Ok(())
    }

    /// Replaces a block's content verbatim.
    pub fn update_content(&mut self, id: BlockId, content: impl Into<String>) -> CoreResult<()> {
        self.session_mut()?.repo.update_content(id, content)?;
        self.committed(vec![id]);
        Ok(())
    }

    /// Shallow-merges a patch into a block's properties.
    pub fn update_properties(&mut self, id: BlockId, patch: &PropertyPatch) -> CoreResult<()> {
        self.session_mut()?.repo.update_properties(id, patch)?;
        self.committed(vec![id]);
        Ok(())
    }

    /// Duplicates a block (and its subtree) right after itself.
    pub fn duplicate_block(&mut self, id: BlockId) -> CoreResult<BlockId> {
        let copy = self.session_mut()?.repo.duplicate_block(id)?;
        self.committed(vec![copy]);
        Ok(copy)
    }

    /// Changes a block's type.
    pub fn convert_block(&mut self, id: BlockId, kind: BlockType) -> CoreResult<()> {
        self.session_mut()?.repo.convert_block(id, kind)?;
        self.committed(vec![id]);
        Ok(())
    }

    /// Flips a task's `checked` flag and returns the new value.
    pub fn toggle_task(&mut self, id: BlockId) -> CoreResult<bool> {
        let session = self.session_mut()?;
        let block = session.repo.find_block(id)?;
        if block.block_type() != BlockType::Task {
            return Err(CoreError::InvariantViolation(format!(
                "block {id} is a {}, not a task",
                block.block_type()
            )));
        }
        let checked = !block.is_checked();
        session
            .repo
            .update_properties(id, &PropertyPatch::new().set(keys::CHECKED, checked))?;
        self.committed(vec![id]);
        Ok(checked)
    }

    /// Renames the open document.
    pub fn set_title(&mut self, title: impl Into<String>) -> CoreResult<()> {
        self.session_mut()?.repo.set_title(title);
        self.committed(Vec::new());
        Ok(())
    }

    // ==================== Content & Intents ====================

    /// Commits a surface buffer into a block.
    ///
    /// Runs the autoformatter when enabled. If the content was reformatted
    /// and the block is active, the cursor is re-anchored to the end.
    pub fn commit(&mut self, id: BlockId, content: &str) -> CoreResult<CommitOutcome> {
        let autoformat = self.config.editor.autoformat;
        let formatted = if autoformat {
            self.formatter.format(content)
        } else {
            FormatOutcome {
                converted: content.to_string(),
                changed: false,
            }
        };

        let session = self.session_mut()?;
        let block = session.repo.find_block(id)?;
        let changed = block.content() != formatted.converted;
        if changed {
            session.repo.update_content(id, formatted.converted.as_str())?;
        }

        let refocus = formatted.changed && session.focus.is_active(id);
        if refocus {
            session
                .focus
                .set_active(&session.repo, id, CursorIntent::End)?;
        }

        if changed {
            self.committed(vec![id]);
        }
        if refocus {
            self.emit_focus();
        }

        Ok(CommitOutcome {
            content: formatted.converted,
            changed,
            reformatted: formatted.changed,
        })
    }

    /// Applies an editing intent.
    ///
    /// The target must exist (`NotFound` otherwise). Requests addressed to a
    /// block other than the active one are ignored without side effects.
    pub fn apply_intent(&mut self, request: IntentRequest) -> CoreResult<IntentOutcome> {
        let session = self.session()?;
        session.repo.find_block(request.target)?;
        if !session.focus.is_active(request.target) {
            tracing::warn!(
                target = %request.target,
                active = ?session.focus.active(),
                intent = ?request.intent,
                "ignoring intent from inactive block"
            );
            return Ok(IntentOutcome::Ignored);
        }

        let mut offset = request.offset;
        if let Some(buffer) = &request.buffer {
            // The surface offset counts positions in the raw buffer, which
            // no longer exist once autoformat rewrote it.
            if self.commit(request.target, buffer)?.reformatted {
                offset = self.cursor_offset().unwrap_or(offset);
            }
        }

        let session = self.session.as_mut().ok_or(CoreError::NoDocument)?;
        let outcome = intent::dispatch(
            &mut session.repo,
            &mut session.focus,
            &self.config.editor,
            request.target,
            request.intent,
            offset,
        )?;

        match &outcome {
            IntentOutcome::Applied { affected } => {
                self.committed(affected.clone());
                self.emit_focus();
            }
            IntentOutcome::FocusMoved(_) => self.emit_focus(),
            IntentOutcome::NoOp | IntentOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    /// Resolves a key press against the keymap and applies the bound intent
    /// to the active block.
    ///
    /// Returns `None` if the key isn't bound.
    pub fn handle_key(
        &mut self,
        key: &KeyPress,
        offset: usize,
        buffer: Option<String>,
    ) -> CoreResult<Option<IntentOutcome>> {
        let Some(intent) = self.keymap.resolve(key) else {
            return Ok(None);
        };
        let target = self.active_block().ok_or(CoreError::NoActiveBlock)?;

        let mut request = IntentRequest::new(target, intent).at(offset);
        request.buffer = buffer;
        self.apply_intent(request).map(Some)
    }

    // ==================== Drag & Drop ====================

    /// Starts dragging `source`, replacing any unfinished drag.
    pub fn begin_drag(&mut self, source: BlockId) -> CoreResult<()> {
        let session = self.session_mut()?;
        session.drag = Some(DragSession::begin(&session.repo, source)?);
        Ok(())
    }

    /// Updates the pointer position and returns the would-be drop target.
    pub fn hover_drag(
        &mut self,
        hovered: BlockId,
        offset_x: f32,
        offset_y: f32,
        height: f32,
    ) -> CoreResult<Option<DropTarget>> {
        let Self {
            session, config, ..
        } = self;
        let session = session.as_mut().ok_or(CoreError::NoDocument)?;
        let Some(drag) = session.drag.as_mut() else {
            return Ok(None);
        };
        drag.hover(hovered, offset_x, offset_y, height);
        Ok(drag.preview(&session.repo, &config.reorder))
    }

    /// Releases the drag and commits the move it resolves to.
    pub fn finish_drag(&mut self) -> CoreResult<DropOutcome> {
        let session = self.session.as_mut().ok_or(CoreError::NoDocument)?;
        let Some(drag) = session.drag.take() else {
            return Ok(DropOutcome::Aborted);
        };
        let source = drag.source();
        let outcome = drag.finish(&mut session.repo, &self.config.reorder)?;
        if let DropOutcome::Moved(_) = outcome {
            self.committed(vec![source]);
        }
        Ok(outcome)
    }

    /// Abandons the drag; the order is left exactly as it was.
    pub fn cancel_drag(&mut self) -> CoreResult<()> {
        if let Some(drag) = self.session_mut()?.drag.take() {
            tracing::debug!(source = %drag.source(), "drag cancelled");
        }
        Ok(())
    }

    /// Resolves and commits a complete gesture in one step.
    pub fn drop_block(&mut self, gesture: &Gesture) -> CoreResult<DropOutcome> {
        let session = self.session.as_mut().ok_or(CoreError::NoDocument)?;
        let outcome = reorder::apply_drop(&mut session.repo, gesture, &self.config.reorder)?;
        if let DropOutcome::Moved(_) = outcome {
            self.committed(vec![gesture.source]);
        }
        Ok(outcome)
    }

    // ==================== Configuration ====================

    /// Returns the editor configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Updates the configuration.
    pub fn set_config(&mut self, config: Config) {
        self.keymap = Keymap::from_config(&config);
        if let Some(saver) = self.autosaver.as_mut() {
            saver.set_delay(config.autosave.delay());
            if !config.autosave.enabled {
                saver.cancel();
            }
        }
        self.config = config;
        self.emit(EditorEvent::ConfigChanged);
    }

    /// Returns the keymap.
    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    // ==================== Events ====================

    /// Subscribes to editor events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EditorEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn emit(&self, event: EditorEvent) {
        self.event_bus.emit(event);
    }

    fn emit_focus(&self) {
        let Some(session) = &self.session else {
            return;
        };
        if let (Some(block), Some(offset)) = (
            session.focus.active(),
            session.focus.resolved_offset(&session.repo),
        ) {
            self.emit(EditorEvent::FocusChanged { block, offset });
        }
    }

    /// Announces a committed mutation and schedules an autosave.
    fn committed(&mut self, affected: Vec<BlockId>) {
        let Some(session) = &self.session else {
            return;
        };
        let document = session.repo.document().id();
        self.event_bus
            .emit(EditorEvent::BlocksChanged { document, affected });

        if self.config.autosave.enabled {
            if let Some(saver) = self.autosaver.as_mut() {
                saver.schedule(session.repo.to_record());
            }
        }
    }

    fn session(&self) -> CoreResult<&Session> {
        self.session.as_ref().ok_or(CoreError::NoDocument)
    }

    fn session_mut(&mut self) -> CoreResult<&mut Session> {
        self.session.as_mut().ok_or(CoreError::NoDocument)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}
