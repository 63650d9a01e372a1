//! End-to-end editing scenarios driven through the `Editor` facade.

use std::sync::Arc;
use std::time::Duration;

use blockwise_core::{
    Config, CoreError, CursorIntent, DropOutcome, Editor, EditorEvent, Gesture, Intent,
    IntentOutcome, IntentRequest, MemoryStore,
};
use blockwise_model::{BlockId, BlockType, Placement};
use proptest::prelude::*;

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.autosave.enabled = false;
    config
}

fn editor_with(contents: &[&str]) -> (Editor, Vec<BlockId>) {
    let mut editor = Editor::with_config(quiet_config());
    editor.new_document("Scenario").unwrap();
    let first = editor.active_block().unwrap();
    editor.update_content(first, contents[0]).unwrap();
    let mut ids = vec![first];
    for content in &contents[1..] {
        let last = *ids.last().unwrap();
        ids.push(
            editor
                .insert_block(last, BlockType::Paragraph, *content, Placement::After)
                .unwrap(),
        );
    }
    (editor, ids)
}

fn content(editor: &Editor, id: BlockId) -> String {
    editor
        .document()
        .unwrap()
        .find_block(id)
        .unwrap()
        .content()
        .to_string()
}

#[test]
fn split_moves_tail_into_new_block() {
    let (mut editor, ids) = editor_with(&["ABCD"]);
    editor.focus_block(ids[0], CursorIntent::Offset(2)).unwrap();

    let outcome = editor
        .apply_intent(IntentRequest::new(ids[0], Intent::Split).at(2))
        .unwrap();
    assert!(outcome.is_applied());

    let root = editor.document().unwrap().root().to_vec();
    assert_eq!(root.len(), 2);
    assert_eq!(root[0], ids[0]);
    assert_eq!(content(&editor, ids[0]), "AB");
    assert_eq!(content(&editor, root[1]), "CD");
    let created = editor.document().unwrap().find_block(root[1]).unwrap();
    assert_eq!(created.block_type(), BlockType::Paragraph);
    assert_eq!(editor.active_block(), Some(root[1]));
    assert_eq!(editor.cursor_offset(), Some(0));
}

#[test]
fn merge_joins_into_previous_block() {
    let (mut editor, ids) = editor_with(&["Hello", "World"]);
    editor.focus_block(ids[1], CursorIntent::Start).unwrap();

    editor
        .apply_intent(IntentRequest::new(ids[1], Intent::Backspace).at(0))
        .unwrap();

    assert_eq!(editor.document().unwrap().root(), &[ids[0]]);
    assert_eq!(content(&editor, ids[0]), "HelloWorld");
    assert_eq!(editor.active_block(), Some(ids[0]));
    assert_eq!(editor.cursor_offset(), Some(5));
}

#[test]
fn drag_reorders_and_restores() {
    let (mut editor, ids) = editor_with(&["A", "B", "C"]);
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    let below_c = Gesture::new(a, c).at(0.0, 15.0, 20.0);
    assert!(matches!(editor.drop_block(&below_c).unwrap(), DropOutcome::Moved(_)));
    assert_eq!(editor.document().unwrap().root(), &[b, c, a]);

    let above_b = Gesture::new(a, b).at(0.0, 5.0, 20.0);
    assert!(matches!(editor.drop_block(&above_b).unwrap(), DropOutcome::Moved(_)));
    assert_eq!(editor.document().unwrap().root(), &[a, b, c]);
}

#[test]
fn deleting_last_root_block_is_rejected() {
    let (mut editor, ids) = editor_with(&["only"]);
    let before = editor.snapshot().unwrap();

    let err = editor.delete_block(ids[0]).unwrap_err();
    assert!(matches!(err, CoreError::InvariantViolation(_)));
    assert_eq!(editor.snapshot().unwrap(), before);
    assert_eq!(editor.active_block(), Some(ids[0]));
}

#[test]
fn autoformat_on_commit() {
    let (mut editor, ids) = editor_with(&[""]);
    let outcome = editor.commit(ids[0], "**bold** and *it*alic").unwrap();
    assert_eq!(outcome.content, "<strong>bold</strong> and <em>it</em>alic");
    assert!(outcome.reformatted);
}

#[test]
fn stray_intent_leaves_document_untouched() {
    let (mut editor, ids) = editor_with(&["One", "Two"]);
    editor.focus_block(ids[1], CursorIntent::End).unwrap();
    let before = editor.snapshot().unwrap();

    let outcome = editor
        .apply_intent(IntentRequest::new(ids[0], Intent::Backspace).with_buffer("changed"))
        .unwrap();
    assert_eq!(outcome, IntentOutcome::Ignored);
    assert_eq!(editor.snapshot().unwrap(), before);
}

#[test]
fn indent_and_outdent_round_trip() {
    let (mut editor, ids) = editor_with(&["Parent", "Child"]);
    editor.focus_block(ids[1], CursorIntent::Start).unwrap();

    editor
        .apply_intent(IntentRequest::new(ids[1], Intent::Indent))
        .unwrap();
    let repo = editor.document().unwrap();
    assert_eq!(repo.root(), &[ids[0]]);
    assert_eq!(repo.find_block(ids[1]).unwrap().parent(), Some(ids[0]));

    editor
        .apply_intent(IntentRequest::new(ids[1], Intent::Outdent))
        .unwrap();
    let repo = editor.document().unwrap();
    assert_eq!(repo.root(), &[ids[0], ids[1]]);
    assert_eq!(editor.active_block(), Some(ids[1]));
}

#[tokio::test(start_paused = true)]
async fn autosave_keeps_only_the_latest_edit() {
    let store = Arc::new(MemoryStore::new());
    let mut config = Config::default();
    config.autosave.delay_ms = 1000;
    let mut editor = Editor::with_config(config).with_store(store.clone());
    let doc = editor.new_document("Autosaved").unwrap();
    let first = editor.active_block().unwrap();
    let mut events = editor.subscribe();

    for text in ["d", "dr", "dra", "draft"] {
        editor.commit(first, text).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(store.save_count(), 0);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(store.save_count(), 1);
    let saved = store.get(doc).await.unwrap();
    assert_eq!(saved.blocks[0].content, "draft");

    let mut saved_events = 0;
    while let Ok(event) = events.try_recv() {
        if event == EditorEvent::DocumentSaved(doc) {
            saved_events += 1;
        }
    }
    assert_eq!(saved_events, 1);
}

#[tokio::test(start_paused = true)]
async fn switching_documents_keeps_the_pending_save() {
    let store = Arc::new(MemoryStore::new());
    let mut config = Config::default();
    config.autosave.delay_ms = 1000;
    let mut editor = Editor::with_config(config).with_store(store.clone());

    let first_doc = editor.new_document("First").unwrap();
    let first = editor.active_block().unwrap();
    editor.commit(first, "first edit").unwrap();

    let second_doc = editor.new_document("Second").unwrap();
    let second = editor.active_block().unwrap();
    editor.commit(second, "second edit").unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let saved = store.get(first_doc).await.expect("first document saved");
    assert_eq!(saved.blocks[0].content, "first edit");
    let saved = store.get(second_doc).await.expect("second document saved");
    assert_eq!(saved.blocks[0].content, "second edit");
}

// ==================== Random Intents ====================

#[derive(Debug, Clone)]
enum Step {
    Intent(usize, usize),
    Focus(usize),
    Drop(usize, usize, bool),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..Intent::ALL.len(), 0usize..8).prop_map(|(i, o)| Step::Intent(i, o)),
        any::<usize>().prop_map(Step::Focus),
        (any::<usize>(), any::<usize>(), any::<bool>()).prop_map(|(a, b, c)| Step::Drop(a, b, c)),
    ]
}

proptest! {
    #[test]
    fn every_step_keeps_a_valid_focused_tree(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let (mut editor, _) = editor_with(&["alpha", "be<br>ta", "", "gamma"]);

        for step in &steps {
            let order = editor.document().unwrap().document_order();
            match *step {
                Step::Intent(i, offset) => {
                    let target = editor.active_block().unwrap();
                    let request = IntentRequest::new(target, Intent::ALL[i]).at(offset);
                    editor.apply_intent(request).unwrap();
                }
                Step::Focus(n) => {
                    editor.focus_block(order[n % order.len()], CursorIntent::End).unwrap();
                }
                Step::Drop(a, b, below) => {
                    let y = if below { 15.0 } else { 5.0 };
                    let gesture = Gesture::new(order[a % order.len()], order[b % order.len()])
                        .at(0.0, y, 20.0);
                    editor.drop_block(&gesture).unwrap();
                }
            }

            let repo = editor.document().unwrap();
            prop_assert!(repo.validate().is_ok(), "invalid tree after {:?}", step);
            prop_assert!(!repo.root().is_empty());
            let active = editor.active_block();
            prop_assert!(active.is_some_and(|id| repo.contains(id)), "dangling focus after {:?}", step);
        }
    }
}
