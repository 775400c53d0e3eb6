// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{AdminOnly, RequireRole},
    },
    models::auth::{AuthResponse, CreateUserPayload, LoginPayload, UserWithRoles},
};

// Handler de login (username ou e-mail)
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let token = app_state
        .auth_service
        .login_user(&payload.identifier, &payload.password)
        .await?;

    Ok(Json(AuthResponse { token }))
}

// Handler da rota protegida /me
pub async fn get_me(AuthenticatedUser(current): AuthenticatedUser) -> Json<UserWithRoles> {
    Json(UserWithRoles {
        user: current.user,
        roles: current.roles,
    })
}

pub async fn list_users(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
) -> Result<impl IntoResponse, AppError> {
    let users = app_state.user_repo.list_all().await?;

    let mut result = Vec::with_capacity(users.len());
    for user in users {
        let roles = app_state.user_repo.roles_for_user(user.id).await?;
        result.push(UserWithRoles { user, roles });
    }

    Ok((StatusCode::OK, Json(result)))
}

pub async fn create_user(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let user = app_state
        .auth_service
        .create_user(
            &app_state.db_pool,
            &payload.username,
            &payload.email,
            &payload.password,
            &payload.roles,
        )
        .await?;

    let roles = app_state.user_repo.roles_for_user(user.id).await?;
    Ok((StatusCode::CREATED, Json(UserWithRoles { user, roles })))
}

pub async fn list_roles(
    State(app_state): State<AppState>,
    _guard: RequireRole<AdminOnly>,
) -> Result<impl IntoResponse, AppError> {
    let roles = app_state.user_repo.list_roles().await?;
    Ok((StatusCode::OK, Json(roles)))
}
