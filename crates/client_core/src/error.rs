use std::fmt;

use shared::domain::NoteId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Content,
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => f.write_str("title"),
            Self::Content => f.write_str("content"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    List,
    Create,
    Update,
    Delete,
    Search,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Search => "search",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Title & Content required! (missing {field})")]
    Validation { field: FormField },
    #[error("{operation} request failed: {source}")]
    RemoteCall {
        operation: RemoteOperation,
        source: anyhow::Error,
    },
    #[error("note {0} is not in the local list")]
    UnknownNote(NoteId),
    #[error("search is not available for the basic list variant")]
    SearchUnavailable,
    #[error("discarded stale {operation} response for note {id}")]
    StaleResponse {
        id: NoteId,
        operation: RemoteOperation,
    },
}

impl ControllerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteCall { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleResponse { .. })
    }
}
