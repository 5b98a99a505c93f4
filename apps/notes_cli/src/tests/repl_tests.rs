use super::*;

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::TimeZone;
use client_core::{ControllerOptions, MissingNotesApi, NotesApi, RemoteOperation};
use shared::protocol::{Note, NoteDraft};
use tokio::sync::Mutex;

#[derive(Default)]
struct InMemoryApi {
    notes: Mutex<Vec<Note>>,
}

#[async_trait]
impl NotesApi for InMemoryApi {
    async fn list_notes(&self) -> anyhow::Result<Vec<Note>> {
        Ok(self.notes.lock().await.clone())
    }

    async fn create_note(&self, draft: &NoteDraft) -> anyhow::Result<Note> {
        let mut notes = self.notes.lock().await;
        let note = Note {
            id: NoteId(notes.len() as i64 + 1),
            title: draft.title.clone(),
            content: draft.content.clone(),
            created_at: draft.created_at,
        };
        notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, _draft: &NoteDraft) -> anyhow::Result<Note> {
        Err(anyhow!("update of note {id} not supported"))
    }

    async fn delete_note(&self, id: NoteId) -> anyhow::Result<()> {
        self.notes.lock().await.retain(|note| note.id != id);
        Ok(())
    }

    async fn search_notes(&self, _query: &str) -> anyhow::Result<Vec<Note>> {
        Ok(Vec::new())
    }
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("utf8")
}

#[test]
fn parses_commands_with_free_text_arguments() {
    assert_eq!(parse_command("   "), Ok(None));
    assert_eq!(
        parse_command("title  Shopping list "),
        Ok(Some(ReplCommand::Title("Shopping list".to_string())))
    );
    assert_eq!(
        parse_command("SEARCH foo bar"),
        Ok(Some(ReplCommand::Search("foo bar".to_string())))
    );
    assert_eq!(parse_command("rm 4"), Ok(Some(ReplCommand::Delete(NoteId(4)))));
    assert_eq!(parse_command("edit 12"), Ok(Some(ReplCommand::Edit(NoteId(12)))));
    assert_eq!(parse_command("quit"), Ok(Some(ReplCommand::Quit)));
}

#[test]
fn rejects_unknown_commands_and_bad_ids() {
    assert!(parse_command("frobnicate").is_err());
    assert!(parse_command("edit abc").is_err());
    assert!(parse_command("delete").is_err());
}

#[test]
fn clock_uses_24_hour_time() {
    let now = Local.with_ymd_and_hms(2025, 1, 2, 21, 5, 9).unwrap();
    assert_eq!(clock_line(now), "21:05:09");
}

#[test]
fn renders_created_at_only_for_advanced_variant() {
    let view = NoteListView {
        notes: vec![Note {
            id: NoteId(1),
            title: "A".to_string(),
            content: "x".to_string(),
            created_at: Some(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()),
        }],
        editing: Some(NoteId(1)),
        ..NoteListView::default()
    };

    let mut advanced = Vec::new();
    render_view(&view, ListVariant::Advanced, &mut advanced).expect("render");
    let advanced = output(advanced);
    assert!(advanced.contains("*[1] A"));
    assert!(advanced.contains("created "));
    assert!(advanced.contains("editing note 1"));

    let mut basic = Vec::new();
    render_view(&view, ListVariant::Basic, &mut basic).expect("render");
    assert!(!output(basic).contains("created "));
}

fn session(api: Arc<dyn NotesApi>) -> ReplSession {
    ReplSession::new(NoteListController::new(api, ControllerOptions::default()))
}

#[tokio::test]
async fn save_without_content_prints_validation_message() {
    let mut session = session(Arc::new(InMemoryApi::default()));
    let mut out = Vec::new();

    session
        .execute(ReplCommand::Title("A".into()), &mut out)
        .await
        .expect("title");
    session
        .execute(ReplCommand::Save, &mut out)
        .await
        .expect("save");

    let out = output(out);
    assert!(out.contains("Title & Content required!"));
    assert!(!out.contains("diagnostic:"));
    assert!(session.controller().snapshot().await.notes.is_empty());
}

#[tokio::test]
async fn save_renders_new_note_and_quit_ends_session() {
    let mut session = session(Arc::new(InMemoryApi::default()));
    let mut out = Vec::new();

    session
        .execute(ReplCommand::Title("A".into()), &mut out)
        .await
        .expect("title");
    session
        .execute(ReplCommand::Content("x".into()), &mut out)
        .await
        .expect("content");
    let mut saved = Vec::new();
    session
        .execute(ReplCommand::Save, &mut saved)
        .await
        .expect("save");

    let saved = output(saved);
    assert!(saved.contains("[1] A"));
    assert!(saved.contains("form (new note): title=\"\" content=\"\""));
    assert!(!session
        .execute(ReplCommand::Quit, &mut out)
        .await
        .expect("quit"));
}

#[tokio::test]
async fn remote_failures_are_printed_as_diagnostics_and_session_continues() {
    let mut session = session(Arc::new(MissingNotesApi));
    let mut out = Vec::new();

    let keep_going = session
        .execute(ReplCommand::Search("a".into()), &mut out)
        .await
        .expect("search");

    assert!(keep_going);
    let out = output(out);
    assert!(out.contains("diagnostic: search failed: notes service is unavailable"));
    assert!(!out.contains("error: search request failed"));
    assert!(out.contains("(no notes)"));
}

#[tokio::test]
async fn start_reports_a_failed_initial_load_once() {
    let mut session = session(Arc::new(MissingNotesApi));
    let mut out = Vec::new();

    session.start(&mut out).await.expect("start");
    session
        .execute(ReplCommand::List, &mut out)
        .await
        .expect("list");

    let out = output(out);
    assert_eq!(out.matches("diagnostic: list failed").count(), 1);
    assert_eq!(out.matches("(no notes)").count(), 2);
}

#[tokio::test]
async fn local_errors_are_printed_without_diagnostics() {
    let mut session = session(Arc::new(InMemoryApi::default()));
    let mut out = Vec::new();

    session
        .execute(ReplCommand::Edit(NoteId(9)), &mut out)
        .await
        .expect("edit");

    let out = output(out);
    assert!(out.contains("error: note 9 is not in the local list"));
    assert!(!out.contains("diagnostic:"));
}

#[tokio::test]
async fn routine_events_are_drained_silently() {
    let mut session = session(Arc::new(InMemoryApi::default()));
    let mut out = Vec::new();
    session.start(&mut out).await.expect("start");
    session
        .execute(ReplCommand::Title("A".into()), &mut out)
        .await
        .expect("title");
    session
        .execute(ReplCommand::Content("x".into()), &mut out)
        .await
        .expect("content");
    session
        .execute(ReplCommand::Save, &mut out)
        .await
        .expect("save");

    let mut pending = Vec::new();
    assert_eq!(session.drain_diagnostics(&mut pending).expect("drain"), 0);
    assert!(pending.is_empty());
    assert!(!output(out).contains("diagnostic:"));
}

#[test]
fn stale_and_failed_events_have_diagnostic_lines() {
    let stale = ControllerEvent::StaleResponseDiscarded {
        id: NoteId(3),
        operation: RemoteOperation::Update,
    };
    assert_eq!(
        diagnostic_line(&stale).as_deref(),
        Some("diagnostic: ignored an out-of-date update response for note 3")
    );

    let failed = ControllerEvent::RemoteCallFailed {
        operation: RemoteOperation::Delete,
        message: "HTTP 404: Note not found".to_string(),
    };
    assert_eq!(
        diagnostic_line(&failed).as_deref(),
        Some("diagnostic: delete failed: HTTP 404: Note not found")
    );

    assert_eq!(
        diagnostic_line(&ControllerEvent::NoteDeleted { id: NoteId(3) }),
        None
    );
}
