use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use tokio::sync::{broadcast, watch};
use tracing::debug;
use uuid::Uuid;

use super::{api::NotesClient, ClientError};
use crate::notes::{repo_types::newest_first, Note};

/// A server-confirmed note plus display-only flags that are never sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedNote {
    pub note: Note,
    pub deleting: bool,
}

impl From<Note> for CachedNote {
    fn from(note: Note) -> Self {
        Self {
            note,
            deleting: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Client mirror of the signed-in user's notes.
///
/// Creates and updates land only after the server confirms them. Deletes
/// flag the entry at once and either drop it on success or unflag it on
/// failure; the flag survives refreshes and merges while the delete is in
/// flight. Logout empties the cache synchronously, and any response that
/// arrives for an older session is discarded without a notice.
pub struct NoteCache {
    client: Arc<NotesClient>,
    notes: Arc<watch::Sender<Vec<CachedNote>>>,
    notices: broadcast::Sender<Notice>,
    pending_deletes: Mutex<HashSet<Uuid>>,
}

impl NoteCache {
    pub fn new(client: Arc<NotesClient>) -> Self {
        let (notes, _) = watch::channel(Vec::new());
        let notes = Arc::new(notes);

        let on_logout = Arc::downgrade(&notes);
        client.session().on_logout(move || {
            if let Some(notes) = on_logout.upgrade() {
                notes.send_replace(Vec::new());
            }
        });

        let (notices, _) = broadcast::channel(32);
        Self {
            client,
            notes,
            notices,
            pending_deletes: Mutex::new(HashSet::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<CachedNote> {
        self.notes.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<CachedNote>> {
        self.notes.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Replaces the cache with the server's list.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let epoch = self.client.session().epoch();
        match self.client.list_notes().await {
            Ok(notes) => {
                if self.is_current(epoch) {
                    let mut entries: Vec<CachedNote> = notes.into_iter().map(Into::into).collect();
                    self.mark_pending(&mut entries);
                    sort_entries(&mut entries);
                    self.notes.send_replace(entries);
                }
                Ok(())
            }
            Err(e) => Err(self.fail(epoch, e, "Failed to load notes")),
        }
    }

    pub async fn create(&self, title: Option<&str>, content: &str) -> Result<Note, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::InvalidInput("Content is required"));
        }
        let epoch = self.client.session().epoch();
        match self.client.create_note(title, content).await {
            Ok(note) => {
                self.apply_confirmed(epoch, note.clone(), "Note saved successfully");
                Ok(note)
            }
            Err(e) => Err(self.fail(epoch, e, "Failed to save note")),
        }
    }

    pub async fn update(
        &self,
        id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Note, ClientError> {
        if content.is_some_and(|c| c.trim().is_empty()) {
            return Err(ClientError::InvalidInput("Content is required"));
        }
        let epoch = self.client.session().epoch();
        match self.client.update_note(id, title, content).await {
            Ok(note) => {
                self.apply_confirmed(epoch, note.clone(), "Note saved successfully");
                Ok(note)
            }
            Err(e) => Err(self.fail(epoch, e, "Failed to save note")),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let epoch = self.client.session().epoch();
        self.pending().insert(id);
        self.set_deleting(id, true);

        let result = self.client.delete_note(id).await;
        self.pending().remove(&id);
        match result {
            Ok(()) => {
                if self.is_current(epoch) {
                    self.notes.send_modify(|notes| notes.retain(|n| n.note.id != id));
                    self.notify(NoticeLevel::Success, "Note deleted successfully");
                }
                Ok(())
            }
            Err(e) => {
                self.set_deleting(id, false);
                Err(self.fail(epoch, e, "Failed to delete note"))
            }
        }
    }

    /// Asks the server for a title; the cache itself is untouched.
    pub async fn generate_title(&self, content: &str) -> Result<String, ClientError> {
        let epoch = self.client.session().epoch();
        match self.client.generate_title(content).await {
            Ok(title) => {
                if self.is_current(epoch) {
                    self.notify(NoticeLevel::Success, "Title generated successfully");
                }
                Ok(title)
            }
            Err(e) => Err(self.fail(epoch, e, "Failed to generate title")),
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        let current = self.client.session().epoch() == epoch;
        if !current {
            debug!("dropping response from an ended session");
        }
        current
    }

    fn apply_confirmed(&self, epoch: u64, note: Note, notice: &str) {
        if !self.is_current(epoch) {
            return;
        }
        self.notes.send_modify(|notes| {
            match notes.iter_mut().find(|n| n.note.id == note.id) {
                // keeps a concurrent delete's flag
                Some(entry) => entry.note = note,
                None => notes.push(note.into()),
            }
            sort_entries(notes);
        });
        self.notify(NoticeLevel::Success, notice);
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
        self.pending_deletes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mark_pending(&self, entries: &mut [CachedNote]) {
        let pending = self.pending();
        for entry in entries.iter_mut() {
            entry.deleting = pending.contains(&entry.note.id);
        }
    }

    fn set_deleting(&self, id: Uuid, deleting: bool) {
        self.notes.send_if_modified(|notes| {
            match notes.iter_mut().find(|n| n.note.id == id) {
                Some(entry) if entry.deleting != deleting => {
                    entry.deleting = deleting;
                    true
                }
                _ => false,
            }
        });
    }

    /// Session failures already forced a logout and get no error notice,
    /// nor do failures that outlived their session.
    fn fail(&self, epoch: u64, err: ClientError, message: &str) -> ClientError {
        let session_failure =
            matches!(err, ClientError::SessionRejected | ClientError::Unauthenticated);
        if !session_failure && self.is_current(epoch) {
            self.notify(NoticeLevel::Error, message);
        }
        err
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        // nobody listening is fine
        let _ = self.notices.send(Notice {
            level,
            message: message.to_string(),
        });
    }
}

fn sort_entries(entries: &mut [CachedNote]) {
    entries.sort_by(|a, b| newest_first(&a.note, &b.note));
}
