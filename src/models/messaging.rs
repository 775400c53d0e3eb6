// src/models/messaging.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// --- 1. Contatos ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- 2. Grupos ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- 3. Mensagens ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "message_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
    Scheduled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "recipient_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    Contact,
    Group,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "recipient_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub status: MessageStatus,
    pub recipient_type: RecipientType,
    pub recipient_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

// O telefone é capturado no momento da criação: se o contato mudar de número
// depois, o envio ainda usa o número resolvido na hora.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecipient {
    pub id: Uuid,
    pub message_id: Uuid,
    pub contact_id: Uuid,
    pub phone: String,
    pub status: RecipientStatus,
    pub provider_message_id: Option<String>,
    pub provider_response: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

// --- 4. Configuração do provedor de SMS ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SmsProviderConfig {
    pub id: Uuid,
    pub provider: String,
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub sender_id: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,
    #[validate(length(min = 7, message = "Telefone inválido."))]
    pub phone: String,
    #[validate(email(message = "E-mail inválido."))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessagePayload {
    #[validate(length(min = 1, message = "O título é obrigatório."))]
    pub title: String,
    #[validate(length(min = 1, message = "O corpo da mensagem é obrigatório."))]
    pub body: String,
    pub recipient_type: RecipientType,
    pub recipient_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSmsConfigPayload {
    #[validate(length(min = 1, message = "O provedor é obrigatório."))]
    pub provider: String,
    #[validate(length(min = 8, message = "URL da API inválida."))]
    pub api_url: String,
    #[validate(length(min = 1, message = "A chave de API é obrigatória."))]
    pub api_key: String,
    pub sender_id: Option<String>,
}

// Callback de entrega enviado pelo provedor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReportPayload {
    pub provider_message_id: String,
    pub delivered: bool,
}
