// src/services/sms.rs

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{common::error::AppError, db::MessageRepository, models::messaging::SmsProviderConfig};

// Resultado de um envio aceito pelo provedor.
#[derive(Debug, Clone)]
pub struct SmsDispatch {
    pub provider_message_id: Option<String>,
    pub provider_response: Option<String>,
}

// A costura com o mundo externo: o serviço de mensagens só conhece este
// trait, o que permite trocar o provedor (e mocká-lo nos testes).
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<SmsDispatch, AppError>;
    async fn balance(&self) -> Result<Value, AppError>;
}

// Implementação HTTP: lê a configuração ativa a cada chamada (o provedor é
// selecionado por configuração persistida, não por build).
pub struct HttpSmsGateway {
    client: reqwest::Client,
    message_repo: MessageRepository,
}

impl HttpSmsGateway {
    pub fn new(message_repo: MessageRepository) -> Self {
        Self {
            client: reqwest::Client::new(),
            message_repo,
        }
    }

    async fn active_config(&self) -> Result<SmsProviderConfig, AppError> {
        self.message_repo
            .active_provider_config()
            .await?
            .ok_or_else(|| {
                AppError::SmsProvider("Nenhum provedor de SMS configurado.".to_string())
            })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<SmsDispatch, AppError> {
        let config = self.active_config().await?;

        // Cada provedor tem seu formato de requisição; o que não for
        // "africastalking" cai no formato JSON genérico com Bearer token.
        let request = match config.provider.as_str() {
            "africastalking" => self
                .client
                .post(&config.api_url)
                .header("apiKey", &config.api_key)
                .header("Accept", "application/json")
                .form(&[
                    ("to", phone),
                    ("message", body),
                    ("from", config.sender_id.as_deref().unwrap_or("")),
                ]),
            _ => self
                .client
                .post(&config.api_url)
                .bearer_auth(&config.api_key)
                .json(&json!({
                    "to": phone,
                    "message": body,
                    "from": config.sender_id,
                })),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::SmsProvider(format!("Falha na chamada ao provedor: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::SmsProvider(format!("Resposta ilegível do provedor: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::SmsProvider(format!(
                "Provedor respondeu {}: {}",
                status, text
            )));
        }

        Ok(SmsDispatch {
            provider_message_id: extract_message_id(&text),
            provider_response: Some(text),
        })
    }

    async fn balance(&self) -> Result<Value, AppError> {
        let config = self.active_config().await?;

        let response = self
            .client
            .get(format!("{}/balance", config.api_url.trim_end_matches('/')))
            .bearer_auth(&config.api_key)
            .send()
            .await
            .map_err(|e| AppError::SmsProvider(format!("Falha na consulta de saldo: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SmsProvider(format!(
                "Provedor respondeu {} na consulta de saldo.",
                status
            )));
        }

        let value = response
            .json::<Value>()
            .await
            .map_err(|e| AppError::SmsProvider(format!("Resposta ilegível do provedor: {}", e)))?;
        Ok(value)
    }
}

// Tenta achar o id da mensagem nos formatos de resposta conhecidos.
fn extract_message_id(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;

    if let Some(id) = value.get("messageId").and_then(|v| v.as_str()) {
        return Some(id.to_string());
    }
    // Formato do africastalking: SMSMessageData.Recipients[0].messageId
    value
        .pointer("/SMSMessageData/Recipients/0/messageId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_generic_message_id() {
        let raw = r#"{"messageId": "abc-123", "status": "queued"}"#;
        assert_eq!(extract_message_id(raw), Some("abc-123".to_string()));
    }

    #[test]
    fn extracts_africastalking_message_id() {
        let raw = r#"{"SMSMessageData":{"Recipients":[{"messageId":"ATXid_1","status":"Success"}]}}"#;
        assert_eq!(extract_message_id(raw), Some("ATXid_1".to_string()));
    }

    #[test]
    fn missing_id_yields_none() {
        assert_eq!(extract_message_id("not json"), None);
        assert_eq!(extract_message_id(r#"{"ok":true}"#), None);
    }
}
