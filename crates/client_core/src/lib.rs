use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::NoteId,
    error::ApiError,
    protocol::{DeleteAck, Note, NoteDraft, SearchQuery},
};
use tracing::debug;
use url::Url;

mod controller;
pub mod error;

pub use controller::{
    ControllerEvent, ControllerOptions, NoteForm, NoteListController, NoteListView,
};
pub use error::{ControllerError, FormField, RemoteOperation};

const NOTES_PATH: &str = "notes/";
const SEARCH_PATH: &str = "notes/search/";

/// Remote notes store as seen by the controller.
#[async_trait]
pub trait NotesApi: Send + Sync {
    async fn list_notes(&self) -> Result<Vec<Note>>;
    async fn create_note(&self, draft: &NoteDraft) -> Result<Note>;
    async fn update_note(&self, id: NoteId, draft: &NoteDraft) -> Result<Note>;
    async fn delete_note(&self, id: NoteId) -> Result<()>;
    async fn search_notes(&self, query: &str) -> Result<Vec<Note>>;
}

pub struct MissingNotesApi;

#[async_trait]
impl NotesApi for MissingNotesApi {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        Err(anyhow!("notes service is unavailable"))
    }

    async fn create_note(&self, _draft: &NoteDraft) -> Result<Note> {
        Err(anyhow!("notes service is unavailable"))
    }

    async fn update_note(&self, id: NoteId, _draft: &NoteDraft) -> Result<Note> {
        Err(anyhow!("notes service is unavailable for note {id}"))
    }

    async fn delete_note(&self, id: NoteId) -> Result<()> {
        Err(anyhow!("notes service is unavailable for note {id}"))
    }

    async fn search_notes(&self, _query: &str) -> Result<Vec<Note>> {
        Err(anyhow!("notes service is unavailable"))
    }
}

/// `NotesApi` over HTTP/JSON.
pub struct HttpNotesApi {
    http: Client,
    base_url: Url,
}

impl HttpNotesApi {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    /// `timeout` of `None` keeps reqwest's defaults.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path '{path}' for {}", self.base_url))
    }

    fn note_endpoint(&self, id: NoteId) -> Result<Url> {
        self.endpoint(&format!("{NOTES_PATH}{}", id.0))
    }
}

/// Parses the service base URL so that relative endpoint paths join under it.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim()).with_context(|| format!("invalid base url '{raw}'"))?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("base url '{raw}' cannot carry a path"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_body(status.as_u16(), &body).into())
}

#[async_trait]
impl NotesApi for HttpNotesApi {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let url = self.endpoint(NOTES_PATH)?;
        debug!("notes: GET {url}");
        let res = self.http.get(url).send().await.context("failed to list notes")?;
        let notes = ensure_success(res)
            .await
            .context("failed to list notes")?
            .json()
            .await
            .context("failed to decode note list")?;
        Ok(notes)
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<Note> {
        let url = self.endpoint(NOTES_PATH)?;
        debug!("notes: POST {url}");
        let res = self
            .http
            .post(url)
            .json(draft)
            .send()
            .await
            .context("failed to create note")?;
        let note = ensure_success(res)
            .await
            .context("failed to create note")?
            .json()
            .await
            .context("failed to decode created note")?;
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, draft: &NoteDraft) -> Result<Note> {
        let url = self.note_endpoint(id)?;
        debug!("notes: PUT {url}");
        let res = self
            .http
            .put(url)
            .json(draft)
            .send()
            .await
            .with_context(|| format!("failed to update note {id}"))?;
        let note = ensure_success(res)
            .await
            .with_context(|| format!("failed to update note {id}"))?
            .json()
            .await
            .with_context(|| format!("failed to decode updated note {id}"))?;
        Ok(note)
    }

    async fn delete_note(&self, id: NoteId) -> Result<()> {
        let url = self.note_endpoint(id)?;
        debug!("notes: DELETE {url}");
        let res = self
            .http
            .delete(url)
            .send()
            .await
            .with_context(|| format!("failed to delete note {id}"))?;
        let res = ensure_success(res)
            .await
            .with_context(|| format!("failed to delete note {id}"))?;
        // The body is informational only; an empty or non-JSON body is still a success.
        if let Ok(ack) = res.json::<DeleteAck>().await {
            if let Some(message) = ack.message {
                debug!("notes: delete note {id} acknowledged: {message}");
            }
        }
        Ok(())
    }

    async fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let url = self.endpoint(SEARCH_PATH)?;
        debug!("notes: GET {url} query={query}");
        let res = self
            .http
            .get(url)
            .query(&SearchQuery {
                query: query.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to search notes for '{query}'"))?;
        let notes = ensure_success(res)
            .await
            .with_context(|| format!("failed to search notes for '{query}'"))?
            .json()
            .await
            .context("failed to decode search results")?;
        Ok(notes)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
