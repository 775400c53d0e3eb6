// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

// O que vai dentro do token: quem é, como se chama e o que pode fazer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

// Usuário autenticado + papéis, montado pelo middleware e lido pelos handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub roles: Vec<String>,
}

// ---
// Payloads / Respostas
// ---

#[derive(Debug, Deserialize, Validate)]
pub struct LoginPayload {
    // Aceita username OU e-mail no mesmo campo.
    #[validate(length(min = 1, message = "O identificador é obrigatório."))]
    pub identifier: String,
    #[validate(length(min = 1, message = "A senha é obrigatória."))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(length(min = 3, message = "O username precisa de ao menos 3 caracteres."))]
    pub username: String,
    #[validate(email(message = "E-mail inválido."))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha precisa de ao menos 6 caracteres."))]
    pub password: String,
    // Nomes de papéis existentes (ADMIN, MANAGER, STAFF).
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
}
