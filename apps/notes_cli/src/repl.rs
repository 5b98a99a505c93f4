//! Line-oriented front end: parses user intents and renders controller state.

use std::{io::Write, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use client_core::{ControllerError, ControllerEvent, NoteListController, NoteListView};
use shared::domain::{ListVariant, NoteId};
use tokio::sync::broadcast;
use tracing::debug;

pub const HELP: &str = "\
commands:
  list                 show notes
  title <text>         set the form title
  content <text>       set the form content
  save                 create a note, or update the one being edited
  edit <id>            load a note into the form
  cancel               stop editing and clear the form
  delete <id>          delete a note
  search <query>       show matching notes
  clear                clear the search and reload all notes
  time                 show the current time
  help                 show this help
  quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    List,
    Title(String),
    Content(String),
    Save,
    Edit(NoteId),
    Cancel,
    Delete(NoteId),
    Search(String),
    Clear,
    Time,
    Help,
    Quit,
}

/// `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => ReplCommand::List,
        "title" => ReplCommand::Title(rest.to_string()),
        "content" => ReplCommand::Content(rest.to_string()),
        "save" => ReplCommand::Save,
        "edit" => ReplCommand::Edit(parse_id(rest)?),
        "cancel" => ReplCommand::Cancel,
        "delete" | "rm" => ReplCommand::Delete(parse_id(rest)?),
        "search" => ReplCommand::Search(rest.to_string()),
        "clear" => ReplCommand::Clear,
        "time" => ReplCommand::Time,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

fn parse_id(raw: &str) -> Result<NoteId, String> {
    raw.parse::<i64>()
        .map(NoteId)
        .map_err(|_| format!("expected a note id, got '{raw}'"))
}

/// A controller plus the event receiver the terminal drains for diagnostics.
pub struct ReplSession {
    controller: Arc<NoteListController>,
    events: broadcast::Receiver<ControllerEvent>,
}

impl ReplSession {
    pub fn new(controller: Arc<NoteListController>) -> Self {
        let events = controller.subscribe_events();
        Self { controller, events }
    }

    pub fn controller(&self) -> &NoteListController {
        &self.controller
    }

    /// Initial fetch of the whole collection, then a first render.
    pub async fn start(&mut self, out: &mut impl Write) -> Result<()> {
        let _ = self.controller.load_all().await;
        self.drain_diagnostics(out)?;
        self.render(out).await
    }

    /// Runs one command. Returns `false` when the session should end.
    pub async fn execute(&mut self, command: ReplCommand, out: &mut impl Write) -> Result<bool> {
        let controller = &self.controller;
        let outcome = match command {
            ReplCommand::Quit => return Ok(false),
            ReplCommand::Help => {
                writeln!(out, "{HELP}")?;
                return Ok(true);
            }
            ReplCommand::Time => {
                writeln!(out, "{}", clock_line(Local::now()))?;
                return Ok(true);
            }
            ReplCommand::List => Ok(()),
            ReplCommand::Title(title) => {
                controller.set_title(title).await;
                Ok(())
            }
            ReplCommand::Content(content) => {
                controller.set_content(content).await;
                Ok(())
            }
            ReplCommand::Save => controller.save().await.map(|_| ()),
            ReplCommand::Edit(id) => controller.begin_edit(id).await,
            ReplCommand::Cancel => {
                controller.cancel_edit().await;
                Ok(())
            }
            ReplCommand::Delete(id) => controller.delete(id).await,
            ReplCommand::Search(query) => controller.search(&query).await.map(|_| ()),
            ReplCommand::Clear => controller.clear_search().await.map(|_| ()),
        };

        if let Some(message) = outcome.err().as_ref().and_then(describe_error) {
            writeln!(out, "{message}")?;
        }
        self.drain_diagnostics(out)?;
        self.render(out).await?;
        Ok(true)
    }

    async fn render(&self, out: &mut impl Write) -> Result<()> {
        render_view(
            &self.controller.snapshot().await,
            self.controller.options().variant,
            out,
        )
    }

    /// Prints every pending diagnostic event and returns how many were printed.
    pub fn drain_diagnostics(&mut self, out: &mut impl Write) -> Result<usize> {
        let mut printed = 0;
        loop {
            let line = match self.events.try_recv() {
                Ok(event) => diagnostic_line(&event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    Some(format!("diagnostic: {skipped} events were dropped"))
                }
                Err(_) => break,
            };
            if let Some(line) = line {
                writeln!(out, "{line}")?;
                printed += 1;
            }
        }
        Ok(printed)
    }
}

/// User-facing text for events worth surfacing; the rest only drive redraws.
pub fn diagnostic_line(event: &ControllerEvent) -> Option<String> {
    match event {
        ControllerEvent::RemoteCallFailed { operation, message } => {
            Some(format!("diagnostic: {operation} failed: {message}"))
        }
        ControllerEvent::StaleResponseDiscarded { id, operation } => Some(format!(
            "diagnostic: ignored an out-of-date {operation} response for note {id}"
        )),
        other => {
            debug!("notes_cli: event {other:?}");
            None
        }
    }
}

/// Remote failures and stale responses are reported through the event channel.
fn describe_error(err: &ControllerError) -> Option<String> {
    if err.is_validation() {
        return Some("Title & Content required!".to_string());
    }
    if err.is_remote() || err.is_stale() {
        return None;
    }
    Some(format!("error: {err}"))
}

pub fn render_view(view: &NoteListView, variant: ListVariant, out: &mut impl Write) -> Result<()> {
    if let Some(query) = &view.search_query {
        writeln!(out, "search: \"{query}\" ({} matches)", view.notes.len())?;
    }
    if view.notes.is_empty() {
        writeln!(out, "(no notes)")?;
    }
    for note in &view.notes {
        let marker = if view.editing == Some(note.id) { "*" } else { " " };
        writeln!(out, "{marker}[{}] {}", note.id, note.title)?;
        writeln!(out, "      {}", note.content)?;
        if variant == ListVariant::Advanced {
            if let Some(created_at) = note.created_at {
                writeln!(out, "      created {}", format_created_at(created_at))?;
            }
        }
    }

    let mode = match view.editing {
        Some(id) => format!("editing note {id}"),
        None => "new note".to_string(),
    };
    writeln!(
        out,
        "form ({mode}): title={:?} content={:?}",
        view.form.title, view.form.content
    )?;
    Ok(())
}

pub fn format_created_at(created_at: DateTime<Utc>) -> String {
    created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn clock_line(now: DateTime<Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[path = "tests/repl_tests.rs"]
mod tests;
