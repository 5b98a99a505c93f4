//! Local note list kept in step with the remote store.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use shared::{
    domain::{ListVariant, NoteId},
    protocol::{Note, NoteDraft},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    error::{ControllerError, FormField, RemoteOperation},
    NotesApi,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    pub variant: ListVariant,
    /// Drop update completions overtaken by a newer acknowledged request for the same id.
    pub discard_stale_responses: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteForm {
    pub title: String,
    pub content: String,
}

impl NoteForm {
    fn clear(&mut self) {
        self.title.clear();
        self.content.clear();
    }

    fn validate(&self) -> Result<(), FormField> {
        if self.title.is_empty() {
            return Err(FormField::Title);
        }
        if self.content.is_empty() {
            return Err(FormField::Content);
        }
        Ok(())
    }
}

/// Everything the rendering layer needs to draw the list and the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListView {
    pub notes: Vec<Note>,
    pub editing: Option<NoteId>,
    pub form: NoteForm,
    pub search_query: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    NotesReplaced {
        count: usize,
    },
    NoteSaved {
        note: Note,
        created: bool,
    },
    NoteDeleted {
        id: NoteId,
    },
    EditStarted {
        id: NoteId,
    },
    EditCancelled,
    SearchApplied {
        query: String,
        count: usize,
    },
    SearchCleared,
    ValidationFailed {
        field: FormField,
    },
    RemoteCallFailed {
        operation: RemoteOperation,
        message: String,
    },
    StaleResponseDiscarded {
        id: NoteId,
        operation: RemoteOperation,
    },
}

/// Requests issued for one note id while the stale-response guard is on.
#[derive(Debug, Default)]
struct RequestTracker {
    issued: u64,
    acknowledged: u64,
    in_flight: usize,
}

struct ControllerState {
    view: NoteListView,
    requests: HashMap<NoteId, RequestTracker>,
}

pub struct NoteListController {
    api: Arc<dyn NotesApi>,
    options: ControllerOptions,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl NoteListController {
    pub fn new(api: Arc<dyn NotesApi>, options: ControllerOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            options,
            inner: Mutex::new(ControllerState {
                view: NoteListView::default(),
                requests: HashMap::new(),
            }),
            events,
        })
    }

    pub fn options(&self) -> ControllerOptions {
        self.options
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> NoteListView {
        self.inner.lock().await.view.clone()
    }

    pub async fn set_title(&self, title: impl Into<String>) {
        self.inner.lock().await.view.form.title = title.into();
    }

    pub async fn set_content(&self, content: impl Into<String>) {
        self.inner.lock().await.view.form.content = content.into();
    }

    /// Replaces the local list with the server's collection.
    pub async fn load_all(&self) -> Result<usize, ControllerError> {
        let notes = self
            .api
            .list_notes()
            .await
            .map_err(|err| self.remote_failure(RemoteOperation::List, err))?;

        let notes = dedup_by_id(notes);
        let count = notes.len();
        self.inner.lock().await.view.notes = notes;
        info!("notes: loaded {count} notes");
        self.emit(ControllerEvent::NotesReplaced { count });
        Ok(count)
    }

    /// Creates or updates from the form fields.
    pub async fn save(&self) -> Result<Note, ControllerError> {
        self.save_with_created_at(None).await
    }

    /// Like [`save`](Self::save), with an explicit creation timestamp for new
    /// notes in the advanced variant. Updates never resend `created_at`.
    pub async fn save_with_created_at(
        &self,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<Note, ControllerError> {
        let (form, editing) = {
            let guard = self.inner.lock().await;
            (guard.view.form.clone(), guard.view.editing)
        };

        if let Err(field) = form.validate() {
            warn!("notes: save rejected, missing {field}");
            self.emit(ControllerEvent::ValidationFailed { field });
            return Err(ControllerError::Validation { field });
        }

        match editing {
            Some(id) => self.update(id, form).await,
            None => self.create(form, created_at).await,
        }
    }

    async fn create(
        &self,
        form: NoteForm,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<Note, ControllerError> {
        let mut draft = NoteDraft::new(form.title, form.content);
        if self.options.variant.stamps_created_at() {
            draft = draft.with_created_at(created_at.unwrap_or_else(Utc::now));
        } else if created_at.is_some() {
            debug!("notes: basic variant ignores created_at on create");
        }

        let note = self
            .api
            .create_note(&draft)
            .await
            .map_err(|err| self.remote_failure(RemoteOperation::Create, err))?;

        {
            let mut guard = self.inner.lock().await;
            let notes = &mut guard.view.notes;
            if let Some(pos) = notes.iter().position(|existing| existing.id == note.id) {
                warn!("notes: create returned id {} already held locally", note.id);
                notes.remove(pos);
            }
            if self.options.variant.prepends() {
                notes.insert(0, note.clone());
            } else {
                notes.push(note.clone());
            }
            guard.view.form.clear();
        }

        info!("notes: created note {}", note.id);
        self.emit(ControllerEvent::NoteSaved {
            note: note.clone(),
            created: true,
        });
        Ok(note)
    }

    async fn update(&self, id: NoteId, form: NoteForm) -> Result<Note, ControllerError> {
        let generation = self.begin_request(id).await;
        let draft = NoteDraft::new(form.title, form.content);

        let result = self.api.update_note(id, &draft).await;

        let mut guard = self.inner.lock().await;
        let note = match result {
            Ok(note) => note,
            Err(err) => {
                self.settle_request(&mut guard, id, generation, Settled::Failed);
                drop(guard);
                return Err(self.remote_failure(RemoteOperation::Update, err));
            }
        };
        if !self.settle_request(&mut guard, id, generation, Settled::Updated) {
            drop(guard);
            return Err(self.stale_response(id, RemoteOperation::Update));
        }

        let notes = &mut guard.view.notes;
        match notes.iter().position(|existing| existing.id == id) {
            Some(pos) if self.options.variant.prepends() => {
                notes.remove(pos);
                notes.insert(0, note.clone());
            }
            Some(pos) => notes[pos] = note.clone(),
            None => warn!("notes: updated note {id} is no longer in the local list"),
        }
        // The form belongs to whatever note is being edited now.
        if guard.view.editing == Some(id) {
            guard.view.editing = None;
            guard.view.form.clear();
        }
        drop(guard);

        info!("notes: updated note {id}");
        self.emit(ControllerEvent::NoteSaved {
            note: note.clone(),
            created: false,
        });
        Ok(note)
    }

    pub async fn delete(&self, id: NoteId) -> Result<(), ControllerError> {
        let generation = self.begin_request(id).await;

        let result = self.api.delete_note(id).await;

        let mut guard = self.inner.lock().await;
        if let Err(err) = result {
            self.settle_request(&mut guard, id, generation, Settled::Failed);
            drop(guard);
            return Err(self.remote_failure(RemoteOperation::Delete, err));
        }
        self.settle_request(&mut guard, id, generation, Settled::Deleted);

        guard.view.notes.retain(|note| note.id != id);
        if guard.view.editing == Some(id) {
            // The form keeps its text; a later save creates a fresh note.
            guard.view.editing = None;
        }
        drop(guard);

        info!("notes: deleted note {id}");
        self.emit(ControllerEvent::NoteDeleted { id });
        Ok(())
    }

    /// Loads a note into the form for editing. Local only.
    pub async fn begin_edit(&self, id: NoteId) -> Result<(), ControllerError> {
        {
            let mut guard = self.inner.lock().await;
            let Some(note) = guard.view.notes.iter().find(|note| note.id == id) else {
                return Err(ControllerError::UnknownNote(id));
            };
            let form = NoteForm {
                title: note.title.clone(),
                content: note.content.clone(),
            };
            guard.view.form = form;
            guard.view.editing = Some(id);
        }
        debug!("notes: editing note {id}");
        self.emit(ControllerEvent::EditStarted { id });
        Ok(())
    }

    pub async fn cancel_edit(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.view.editing = None;
            guard.view.form.clear();
        }
        self.emit(ControllerEvent::EditCancelled);
    }

    /// Replaces the displayed list with server-side matches for `query`.
    /// A blank query behaves like [`clear_search`](Self::clear_search).
    pub async fn search(&self, query: &str) -> Result<usize, ControllerError> {
        if !self.options.variant.supports_search() {
            return Err(ControllerError::SearchUnavailable);
        }
        if query.trim().is_empty() {
            return self.clear_search().await;
        }

        let results = self
            .api
            .search_notes(query)
            .await
            .map_err(|err| self.remote_failure(RemoteOperation::Search, err))?;

        let results = dedup_by_id(results);
        let count = results.len();
        {
            let mut guard = self.inner.lock().await;
            guard.view.notes = results;
            guard.view.search_query = Some(query.to_string());
        }
        info!("notes: search '{query}' matched {count} notes");
        self.emit(ControllerEvent::SearchApplied {
            query: query.to_string(),
            count,
        });
        Ok(count)
    }

    /// Drops the query and restores the full collection with a fresh load.
    pub async fn clear_search(&self) -> Result<usize, ControllerError> {
        if !self.options.variant.supports_search() {
            return Err(ControllerError::SearchUnavailable);
        }
        self.inner.lock().await.view.search_query = None;
        self.emit(ControllerEvent::SearchCleared);
        self.load_all().await
    }

    async fn begin_request(&self, id: NoteId) -> u64 {
        if !self.options.discard_stale_responses {
            return 0;
        }
        let mut guard = self.inner.lock().await;
        let tracker = guard.requests.entry(id).or_default();
        tracker.issued += 1;
        tracker.in_flight += 1;
        tracker.issued
    }

    /// Records a completion and reports whether its result may be applied.
    ///
    /// A successful update is stale only when a newer request for the same id
    /// was already acknowledged. A successful delete is final: it is always
    /// applied and outranks everything issued before it. The tracker is
    /// dropped once nothing for the id is in flight.
    fn settle_request(
        &self,
        state: &mut ControllerState,
        id: NoteId,
        generation: u64,
        outcome: Settled,
    ) -> bool {
        if !self.options.discard_stale_responses {
            return true;
        }
        let Some(tracker) = state.requests.get_mut(&id) else {
            return true;
        };
        tracker.in_flight = tracker.in_flight.saturating_sub(1);
        let current = match outcome {
            Settled::Failed => false,
            Settled::Updated if generation < tracker.acknowledged => false,
            Settled::Updated => {
                tracker.acknowledged = generation;
                true
            }
            Settled::Deleted => {
                tracker.acknowledged = tracker.issued;
                true
            }
        };
        if tracker.in_flight == 0 {
            state.requests.remove(&id);
        }
        current
    }

    fn stale_response(&self, id: NoteId, operation: RemoteOperation) -> ControllerError {
        warn!("notes: discarding stale {operation} response for note {id}");
        self.emit(ControllerEvent::StaleResponseDiscarded { id, operation });
        ControllerError::StaleResponse { id, operation }
    }

    fn remote_failure(&self, operation: RemoteOperation, err: anyhow::Error) -> ControllerError {
        let message = format!("{err:#}");
        error!("notes: {operation} failed: {message}");
        self.emit(ControllerEvent::RemoteCallFailed { operation, message });
        ControllerError::RemoteCall {
            operation,
            source: err,
        }
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Updated,
    Deleted,
    Failed,
}

fn dedup_by_id(notes: Vec<Note>) -> Vec<Note> {
    let mut seen = HashSet::with_capacity(notes.len());
    let before = notes.len();
    let unique: Vec<Note> = notes.into_iter().filter(|note| seen.insert(note.id)).collect();
    if unique.len() != before {
        warn!(
            "notes: dropped {} duplicate ids from server response",
            before - unique.len()
        );
    }
    unique
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
