use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse, NoteDto, PageQuery, Paginated};
use crate::models::content::{NewNote, NoteUpdate};
use crate::models::identity::Identity;

#[derive(Deserialize)]
pub struct BatchNotesRequest {
    pub notes: Vec<NewNote>,
}

/// POST /notes
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<NewNote>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    let note = state.content().create_note(&identity.user_id, payload).await?;
    Ok(Json(ApiResponse::success(note.into())))
}

/// POST /notes/batch
/// The whole batch is checked against the quota as one write
pub async fn create_notes_batch(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<BatchNotesRequest>,
) -> Result<Json<ApiResponse<Vec<NoteDto>>>, ApiError> {
    let notes = state
        .content()
        .create_notes(&identity.user_id, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(
        notes.into_iter().map(NoteDto::from).collect(),
    )))
}

/// GET /notes
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Paginated<NoteDto>>>, ApiError> {
    let (page, page_size) = query.resolve();
    let (notes, total) = state
        .content()
        .list_notes(&identity.user_id, page, page_size)
        .await?;

    Ok(Json(ApiResponse::success(Paginated {
        items: notes.into_iter().map(NoteDto::from).collect(),
        total,
        page,
        page_size,
    })))
}

/// GET /notes/{id}
pub async fn get_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    let note = state.content().get_note(&identity.user_id, &id).await?;
    Ok(Json(ApiResponse::success(note.into())))
}

/// PUT /notes/{id}
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<NoteUpdate>,
) -> Result<Json<ApiResponse<NoteDto>>, ApiError> {
    let note = state
        .content()
        .update_note(&identity.user_id, &id, payload)
        .await?;
    Ok(Json(ApiResponse::success(note.into())))
}

/// DELETE /notes/{id}
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.content().delete_note(&identity.user_id, &id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Note deleted"))))
}
