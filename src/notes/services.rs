use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::NoteError,
    notes::{
        repo::NoteRepo,
        repo_types::{now_micros, Note, NoteChanges},
    },
    summarizer::Summarizer,
};

const CONTENT_REQUIRED: &str = "Content is required";

fn has_text(s: &str) -> bool {
    !s.trim().is_empty()
}

pub async fn list(repo: &dyn NoteRepo, owner: Uuid) -> Result<Vec<Note>, NoteError> {
    Ok(repo.list_by_owner(owner).await?)
}

/// Creates a note; without a usable title the summarizer supplies one.
pub async fn create(
    repo: &dyn NoteRepo,
    summarizer: &Summarizer,
    owner: Uuid,
    title: Option<&str>,
    content: &str,
) -> Result<Note, NoteError> {
    if !has_text(content) {
        warn!(user_id = %owner, "create note without content");
        return Err(NoteError::InvalidInput(CONTENT_REQUIRED));
    }

    let title = match title.filter(|t| has_text(t)) {
        Some(t) => t.to_string(),
        None => summarizer.summarize(content).await,
    };

    let now = now_micros();
    let note = Note {
        id: Uuid::new_v4(),
        title,
        content: content.to_string(),
        user_id: owner,
        created_at: now,
        updated_at: now,
    };
    let note = repo.insert(&note).await?;
    info!(user_id = %owner, note_id = %note.id, "note created");
    Ok(note)
}

/// Replaces the supplied fields. The title is never regenerated here.
pub async fn update(
    repo: &dyn NoteRepo,
    owner: Uuid,
    id: Uuid,
    title: Option<String>,
    content: Option<String>,
) -> Result<Note, NoteError> {
    if content.as_deref().is_some_and(|c| !has_text(c)) {
        warn!(user_id = %owner, note_id = %id, "update note with empty content");
        return Err(NoteError::InvalidInput(CONTENT_REQUIRED));
    }

    let changes = NoteChanges {
        title: title.filter(|t| has_text(t)),
        content,
    };
    let Some(note) = repo.update_owned(owner, id, &changes, now_micros()).await? else {
        warn!(user_id = %owner, note_id = %id, "update of missing or foreign note");
        return Err(NoteError::NotFound);
    };
    info!(user_id = %owner, note_id = %id, "note updated");
    Ok(note)
}

pub async fn delete(repo: &dyn NoteRepo, owner: Uuid, id: Uuid) -> Result<(), NoteError> {
    if !repo.delete_owned(owner, id).await? {
        warn!(user_id = %owner, note_id = %id, "delete of missing or foreign note");
        return Err(NoteError::NotFound);
    }
    info!(user_id = %owner, note_id = %id, "note deleted");
    Ok(())
}

/// Stateless; does not touch the store.
pub async fn generate_title(summarizer: &Summarizer, content: &str) -> String {
    summarizer.summarize(content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::repo::MemoryNoteRepo;

    fn fixture() -> (MemoryNoteRepo, Summarizer) {
        (MemoryNoteRepo::new(), Summarizer::fallback_only())
    }

    #[tokio::test]
    async fn create_without_title_uses_fallback_summary() {
        let (repo, summarizer) = fixture();
        let owner = Uuid::new_v4();
        let content = "Buy milk, eggs, and bread from the store today";

        let note = create(&repo, &summarizer, owner, Some(""), content).await.unwrap();
        assert_eq!(note.title, content);
        assert_eq!(note.content, content);
        assert_eq!(note.user_id, owner);
        assert_eq!(note.created_at, note.updated_at);
    }

    #[tokio::test]
    async fn create_keeps_explicit_title() {
        let (repo, summarizer) = fixture();
        let note = create(&repo, &summarizer, Uuid::new_v4(), Some("Groceries"), "milk")
            .await
            .unwrap();
        assert_eq!(note.title, "Groceries");
    }

    #[tokio::test]
    async fn create_rejects_blank_content() {
        let (repo, summarizer) = fixture();
        for content in ["", "   \n"] {
            let err = create(&repo, &summarizer, Uuid::new_v4(), None, content)
                .await
                .unwrap_err();
            assert!(matches!(err, NoteError::InvalidInput(_)));
        }
        assert_eq!(repo.len().await, 0);
    }

    #[tokio::test]
    async fn update_bumps_updated_at_only() {
        let (repo, summarizer) = fixture();
        let owner = Uuid::new_v4();
        let note = create(&repo, &summarizer, owner, None, "hello world").await.unwrap();

        let updated = update(&repo, owner, note.id, None, Some("hello world, updated".into()))
            .await
            .unwrap();
        assert_eq!(updated.content, "hello world, updated");
        assert_eq!(updated.title, note.title, "title is not regenerated");
        assert!(updated.updated_at > note.updated_at);
        assert_eq!(updated.created_at, note.created_at);
    }

    #[tokio::test]
    async fn update_ignores_blank_title_and_rejects_blank_content() {
        let (repo, summarizer) = fixture();
        let owner = Uuid::new_v4();
        let note = create(&repo, &summarizer, owner, Some("Keep"), "body").await.unwrap();

        let same = update(&repo, owner, note.id, Some(" ".into()), None).await.unwrap();
        assert_eq!(same.title, "Keep");

        let err = update(&repo, owner, note.id, None, Some("".into())).await.unwrap_err();
        assert!(matches!(err, NoteError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn foreign_notes_are_not_found() {
        let (repo, summarizer) = fixture();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let note = create(&repo, &summarizer, alice, None, "secret").await.unwrap();

        assert!(list(&repo, bob).await.unwrap().is_empty());
        assert!(matches!(
            update(&repo, bob, note.id, Some("x".into()), None).await.unwrap_err(),
            NoteError::NotFound
        ));
        assert!(matches!(
            delete(&repo, bob, note.id).await.unwrap_err(),
            NoteError::NotFound
        ));
        assert_eq!(list(&repo, alice).await.unwrap(), vec![note]);
    }

    #[tokio::test]
    async fn delete_unknown_id_leaves_store_unchanged() {
        let (repo, summarizer) = fixture();
        let owner = Uuid::new_v4();
        create(&repo, &summarizer, owner, None, "keep me").await.unwrap();

        let err = delete(&repo, owner, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, NoteError::NotFound));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn list_is_most_recently_updated_first() {
        let (repo, summarizer) = fixture();
        let owner = Uuid::new_v4();
        let mut ids = Vec::new();
        for content in ["a", "b", "c"] {
            ids.push(create(&repo, &summarizer, owner, None, content).await.unwrap().id);
            // distinct timestamps
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        update(&repo, owner, a, None, Some("a2".into())).await.unwrap();

        let listed: Vec<Uuid> = list(&repo, owner).await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(listed, vec![a, c, b]);
    }

    #[tokio::test]
    async fn delete_is_permanent() {
        let (repo, summarizer) = fixture();
        let owner = Uuid::new_v4();
        let note = create(&repo, &summarizer, owner, None, "bye").await.unwrap();
        delete(&repo, owner, note.id).await.unwrap();
        assert!(list(&repo, owner).await.unwrap().is_empty());
        assert!(matches!(
            delete(&repo, owner, note.id).await.unwrap_err(),
            NoteError::NotFound
        ));
    }
}
