use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::{ApiError, NoteError},
    extractors::JsonBody,
    notes::{
        dto::{CreateNoteRequest, GenerateTitleRequest, UpdateNoteRequest},
        repo_types::Note,
        services,
    },
    state::AppState,
};

pub fn note_routes() -> Router<AppState> {
    Router::new()
        .route("/notes", post(create_note).get(list_notes))
        .route("/notes/generate-title", post(generate_title))
        .route("/notes/:id", put(update_note).delete(delete_note))
}

/// Malformed identifiers cannot name an owned note.
fn parse_note_id(raw: &str) -> Result<Uuid, NoteError> {
    Uuid::parse_str(raw).map_err(|_| NoteError::NotFound)
}

#[instrument(skip(state))]
pub async fn list_notes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = services::list(state.notes.as_ref(), user_id).await?;
    Ok(Json(notes))
}

#[instrument(skip(state, body))]
pub async fn create_note(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(body): JsonBody<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let note = services::create(
        state.notes.as_ref(),
        &state.summarizer,
        user_id,
        body.title.as_deref(),
        &body.content,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

#[instrument(skip(state, body))]
pub async fn update_note(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateNoteRequest>,
) -> Result<Json<Note>, ApiError> {
    let id = parse_note_id(&id)?;
    let note = services::update(state.notes.as_ref(), user_id, id, body.title, body.content).await?;
    Ok(Json(note))
}

#[instrument(skip(state))]
pub async fn delete_note(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_note_id(&id)?;
    services::delete(state.notes.as_ref(), user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Note deleted successfully".into(),
    }))
}

#[instrument(skip(state, body))]
pub async fn generate_title(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    JsonBody(body): JsonBody<GenerateTitleRequest>,
) -> Json<String> {
    Json(services::generate_title(&state.summarizer, &body.content).await)
}
