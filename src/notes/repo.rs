use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{sort_newest_first, Note, NoteChanges};

/// Note store. Every lookup is filtered by owner; a note that belongs to
/// someone else is indistinguishable from one that does not exist.
#[async_trait]
pub trait NoteRepo: Send + Sync {
    /// All notes of `owner`, most recently updated first.
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Note>>;

    async fn insert(&self, note: &Note) -> anyhow::Result<Note>;

    /// Applies `changes` and moves `updated_at` to `max(now, previous + 1µs)`.
    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &NoteChanges,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Note>>;

    /// Returns whether a note was removed.
    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

pub struct PgNoteRepo {
    db: PgPool,
}

impl PgNoteRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NoteRepo for PgNoteRepo {
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Note>> {
        let rows = sqlx::query_as::<_, Note>(
            r#"
            SELECT id, title, content, user_id, created_at, updated_at
            FROM notes
            WHERE user_id = $1
            ORDER BY updated_at DESC, created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list notes by owner")?;
        Ok(rows)
    }

    async fn insert(&self, note: &Note) -> anyhow::Result<Note> {
        let row = sqlx::query_as::<_, Note>(
            r#"
            INSERT INTO notes (id, title, content, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, content, user_id, created_at, updated_at
            "#,
        )
        .bind(note.id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.user_id)
        .bind(note.created_at)
        .bind(note.updated_at)
        .fetch_one(&self.db)
        .await
        .context("insert note")?;
        Ok(row)
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &NoteChanges,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Note>> {
        let row = sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
               SET title = COALESCE($3, title),
                   content = COALESCE($4, content),
                   updated_at = GREATEST($5, updated_at + INTERVAL '1 microsecond')
             WHERE id = $1 AND user_id = $2
            RETURNING id, title, content, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.title.as_deref())
        .bind(changes.content.as_deref())
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("update note")?;
        Ok(row)
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete note")?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(Default)]
pub struct MemoryNoteRepo {
    notes: RwLock<HashMap<Uuid, Note>>,
}

impl MemoryNoteRepo {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }
}

#[async_trait]
impl NoteRepo for MemoryNoteRepo {
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .notes
            .read()
            .await
            .values()
            .filter(|n| n.user_id == owner)
            .cloned()
            .collect();
        sort_newest_first(&mut notes);
        Ok(notes)
    }

    async fn insert(&self, note: &Note) -> anyhow::Result<Note> {
        let mut notes = self.notes.write().await;
        anyhow::ensure!(!notes.contains_key(&note.id), "duplicate note id {}", note.id);
        notes.insert(note.id, note.clone());
        Ok(note.clone())
    }

    async fn update_owned(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &NoteChanges,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Note>> {
        let mut notes = self.notes.write().await;
        let Some(note) = notes.get_mut(&id).filter(|n| n.user_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            note.title = title.clone();
        }
        if let Some(content) = &changes.content {
            note.content = content.clone();
        }
        note.updated_at = now.max(note.updated_at + Duration::microseconds(1));
        Ok(Some(note.clone()))
    }

    async fn delete_owned(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut notes = self.notes.write().await;
        if notes.get(&id).is_some_and(|n| n.user_id == owner) {
            notes.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}
