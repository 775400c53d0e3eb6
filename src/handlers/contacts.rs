// src/handlers/contacts.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::messaging::{CreateContactPayload, CreateGroupPayload},
};

// ---
// Contatos
// ---

pub async fn list_contacts(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let contacts = app_state.contact_repo.list_contacts().await?;
    Ok((StatusCode::OK, Json(contacts)))
}

pub async fn create_contact(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateContactPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let contact = app_state
        .contact_repo
        .create_contact(&payload.name, &payload.phone, payload.email.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn delete_contact(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !app_state.contact_repo.delete_contact(id).await? {
        return Err(AppError::NotFound("Contato"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Grupos
// ---

pub async fn list_groups(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let groups = app_state.contact_repo.list_groups().await?;
    Ok((StatusCode::OK, Json(groups)))
}

pub async fn create_group(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateGroupPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let group = app_state
        .contact_repo
        .create_group(&payload.name, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn group_contacts(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .contact_repo
        .find_group(id)
        .await?
        .ok_or(AppError::NotFound("Grupo"))?;

    let contacts = app_state.contact_repo.contacts_in_group(id).await?;
    Ok((StatusCode::OK, Json(contacts)))
}

pub async fn add_group_contact(
    State(app_state): State<AppState>,
    Path((group_id, contact_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .contact_repo
        .find_group(group_id)
        .await?
        .ok_or(AppError::NotFound("Grupo"))?;
    app_state
        .contact_repo
        .find_contact(contact_id)
        .await?
        .ok_or(AppError::NotFound("Contato"))?;

    app_state
        .contact_repo
        .add_contact_to_group(group_id, contact_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_group_contact(
    State(app_state): State<AppState>,
    Path((group_id, contact_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    if !app_state
        .contact_repo
        .remove_contact_from_group(group_id, contact_id)
        .await?
    {
        return Err(AppError::NotFound("Contato no grupo"));
    }
    Ok(StatusCode::NO_CONTENT)
}
