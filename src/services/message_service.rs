// src/services/message_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ContactRepository, MessageRepository},
    models::messaging::{
        Contact, CreateMessagePayload, Message, MessageStatus, RecipientStatus, RecipientType,
    },
    services::sms::{SmsDispatch, SmsGateway},
};

// Uma mensagem agendada só vira elegível quando a hora marcada passou.
pub fn is_due(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    scheduled_at <= now
}

// Destinatário que ainda precisa de envio: SENT já saiu e DELIVERED foi
// confirmado pelo provedor.
pub fn awaiting_dispatch(status: RecipientStatus) -> bool {
    matches!(status, RecipientStatus::Pending | RecipientStatus::Failed)
}

// Derivação do status final: FAILED somente quando TODOS os destinatários
// falharam; sucesso parcial conta como SENT.
pub fn derive_message_status(total: i64, failed: i64) -> MessageStatus {
    if total > 0 && failed == total {
        MessageStatus::Failed
    } else {
        MessageStatus::Sent
    }
}

// Dispara para cada telefone em sequência e devolve um resultado por
// destinatário. Sequencial de propósito: um provedor lento atrasa os
// próximos, mas nunca intercala estados.
pub async fn run_dispatch(
    gateway: &dyn SmsGateway,
    body: &str,
    phones: &[String],
) -> Vec<Result<SmsDispatch, String>> {
    let mut outcomes = Vec::with_capacity(phones.len());
    for phone in phones {
        let outcome = gateway
            .send_sms(phone, body)
            .await
            .map_err(|e| e.to_string());
        outcomes.push(outcome);
    }
    outcomes
}

#[derive(Clone)]
pub struct MessageService {
    message_repo: MessageRepository,
    contact_repo: ContactRepository,
    gateway: Arc<dyn SmsGateway>,
    pool: PgPool,
}

impl MessageService {
    pub fn new(
        message_repo: MessageRepository,
        contact_repo: ContactRepository,
        gateway: Arc<dyn SmsGateway>,
        pool: PgPool,
    ) -> Self {
        Self {
            message_repo,
            contact_repo,
            gateway,
            pool,
        }
    }

    // Resolve o destinatário em uma lista concreta de contatos.
    async fn resolve_contacts(
        &self,
        recipient_type: RecipientType,
        recipient_id: Uuid,
    ) -> Result<Vec<Contact>, AppError> {
        match recipient_type {
            RecipientType::Contact => {
                let contact = self
                    .contact_repo
                    .find_contact(recipient_id)
                    .await?
                    .ok_or(AppError::NotFound("Contato"))?;
                Ok(vec![contact])
            }
            RecipientType::Group => {
                self.contact_repo
                    .find_group(recipient_id)
                    .await?
                    .ok_or(AppError::NotFound("Grupo"))?;
                let contacts = self.contact_repo.contacts_in_group(recipient_id).await?;
                if contacts.is_empty() {
                    return Err(AppError::rule("O grupo não possui contatos."));
                }
                Ok(contacts)
            }
        }
    }

    pub async fn create_message(
        &self,
        payload: CreateMessagePayload,
        created_by: Uuid,
    ) -> Result<Message, AppError> {
        let contacts = self
            .resolve_contacts(payload.recipient_type, payload.recipient_id)
            .await?;

        let now = Utc::now();
        let status = match payload.scheduled_at {
            Some(at) if !is_due(at, now) => MessageStatus::Scheduled,
            _ => MessageStatus::Pending,
        };

        // Mensagem + destinatários em uma transação: ou tudo, ou nada.
        let mut tx = self.pool.begin().await?;

        let message = self
            .message_repo
            .create_message(
                &mut *tx,
                &payload.title,
                &payload.body,
                status,
                payload.recipient_type,
                payload.recipient_id,
                payload.scheduled_at,
                created_by,
            )
            .await?;

        for contact in &contacts {
            self.message_repo
                .create_recipient(&mut *tx, message.id, contact.id, &contact.phone)
                .await?;
        }

        tx.commit().await?;

        // Disparo imediato em background: a resposta HTTP não espera o
        // provedor, e falhas ficam no log e no status da mensagem.
        if status == MessageStatus::Pending {
            let service = self.clone();
            let message_id = message.id;
            tokio::spawn(async move {
                if let Err(e) = service.send_message(message_id).await {
                    tracing::error!("Falha no disparo imediato da mensagem {}: {}", message_id, e);
                }
            });
        }

        Ok(message)
    }

    pub async fn send_message(&self, id: Uuid) -> Result<Message, AppError> {
        let message = self
            .message_repo
            .find_message(id)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))?;

        match message.status {
            // Idempotente: reenviar uma mensagem já enviada é um no-op.
            MessageStatus::Sent => return Ok(message),
            MessageStatus::Cancelled => {
                return Err(AppError::rule("A mensagem foi cancelada."));
            }
            MessageStatus::Scheduled => {
                if let Some(at) = message.scheduled_at {
                    if !is_due(at, Utc::now()) {
                        return Err(AppError::rule(
                            "A mensagem ainda está agendada para o futuro.",
                        ));
                    }
                }
            }
            MessageStatus::Pending | MessageStatus::Failed => {}
        }

        // Qualquer erro não tratado durante o envio marca a mensagem como
        // FAILED antes de propagar.
        match self.dispatch_message(&message).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                if let Err(mark_err) = self
                    .message_repo
                    .set_status(id, MessageStatus::Failed)
                    .await
                {
                    tracing::error!(
                        "Não foi possível marcar a mensagem {} como FAILED: {}",
                        id,
                        mark_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn dispatch_message(&self, message: &Message) -> Result<Message, AppError> {
        let recipients: Vec<_> = self
            .message_repo
            .unsent_recipients(message.id)
            .await?
            .into_iter()
            .filter(|r| awaiting_dispatch(r.status))
            .collect();

        let phones: Vec<String> = recipients.iter().map(|r| r.phone.clone()).collect();
        let outcomes = run_dispatch(self.gateway.as_ref(), &message.body, &phones).await;

        for (recipient, outcome) in recipients.iter().zip(outcomes) {
            match outcome {
                Ok(dispatch) => {
                    self.message_repo
                        .mark_recipient_sent(
                            recipient.id,
                            dispatch.provider_message_id.as_deref(),
                            dispatch.provider_response.as_deref(),
                        )
                        .await?;
                }
                Err(reason) => {
                    tracing::warn!(
                        "Envio falhou para {} (mensagem {}): {}",
                        recipient.phone,
                        message.id,
                        reason
                    );
                    self.message_repo
                        .mark_recipient_failed(recipient.id, &reason)
                        .await?;
                }
            }
        }

        let (total, failed) = self.message_repo.recipient_counts(message.id).await?;
        match derive_message_status(total, failed) {
            MessageStatus::Failed => {
                self.message_repo
                    .set_status(message.id, MessageStatus::Failed)
                    .await?;
            }
            _ => {
                self.message_repo.mark_sent(message.id).await?;
            }
        }

        self.message_repo
            .find_message(message.id)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))
    }

    // Reenvio: só faz sentido a partir de FAILED. Destinatários que já
    // saíram continuam SENT; os falhos voltam a PENDING e tentam de novo.
    pub async fn resend_message(&self, id: Uuid) -> Result<Message, AppError> {
        let message = self
            .message_repo
            .find_message(id)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))?;

        if message.status != MessageStatus::Failed {
            return Err(AppError::rule(
                "Apenas mensagens com falha podem ser reenviadas.",
            ));
        }

        let reset = self.message_repo.reset_failed_recipients(id).await?;
        tracing::info!("Reenvio da mensagem {}: {} destinatários resetados.", id, reset);

        self.message_repo
            .set_status(id, MessageStatus::Pending)
            .await?;
        self.send_message(id).await
    }

    pub async fn cancel_message(&self, id: Uuid) -> Result<Message, AppError> {
        let message = self
            .message_repo
            .find_message(id)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))?;

        if message.status != MessageStatus::Scheduled {
            return Err(AppError::rule(
                "Apenas mensagens agendadas podem ser canceladas.",
            ));
        }

        self.message_repo
            .set_status(id, MessageStatus::Cancelled)
            .await?;
        self.message_repo
            .find_message(id)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))
    }

    // Callback de entrega do provedor.
    pub async fn apply_delivery_report(
        &self,
        provider_message_id: &str,
        delivered: bool,
    ) -> Result<(), AppError> {
        let status = if delivered {
            RecipientStatus::Delivered
        } else {
            RecipientStatus::Failed
        };
        let updated = self
            .message_repo
            .set_recipient_delivery(provider_message_id, status)
            .await?;
        if !updated {
            return Err(AppError::NotFound("Destinatário"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    // Gateway de mentira: falha para qualquer telefone listado.
    struct MockGateway {
        failing: Vec<String>,
    }

    #[async_trait]
    impl SmsGateway for MockGateway {
        async fn send_sms(&self, phone: &str, _body: &str) -> Result<SmsDispatch, AppError> {
            if self.failing.iter().any(|p| p == phone) {
                return Err(AppError::SmsProvider(format!("rejeitado: {}", phone)));
            }
            Ok(SmsDispatch {
                provider_message_id: Some(format!("id-{}", phone)),
                provider_response: Some("ok".to_string()),
            })
        }

        async fn balance(&self) -> Result<Value, AppError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn partial_failure_still_counts_as_sent() {
        assert_eq!(derive_message_status(3, 1), MessageStatus::Sent);
        assert_eq!(derive_message_status(3, 0), MessageStatus::Sent);
    }

    #[test]
    fn all_recipients_failing_means_failed() {
        assert_eq!(derive_message_status(3, 3), MessageStatus::Failed);
        assert_eq!(derive_message_status(1, 1), MessageStatus::Failed);
    }

    #[test]
    fn delivered_recipients_are_not_redispatched() {
        assert!(awaiting_dispatch(RecipientStatus::Pending));
        assert!(awaiting_dispatch(RecipientStatus::Failed));
        assert!(!awaiting_dispatch(RecipientStatus::Sent));
        assert!(!awaiting_dispatch(RecipientStatus::Delivered));
    }

    #[test]
    fn scheduled_message_is_due_only_after_its_time() {
        let now = Utc::now();
        assert!(!is_due(now + chrono::Duration::minutes(5), now));
        assert!(is_due(now - chrono::Duration::minutes(5), now));
        assert!(is_due(now, now));
    }

    #[tokio::test]
    async fn dispatch_records_one_failure_among_three() {
        let gateway = MockGateway {
            failing: vec!["+254700000002".to_string()],
        };
        let phones = vec![
            "+254700000001".to_string(),
            "+254700000002".to_string(),
            "+254700000003".to_string(),
        ];

        let outcomes = run_dispatch(&gateway, "oferta do dia", &phones).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_err());
        assert!(outcomes[2].is_ok());

        let failed = outcomes.iter().filter(|o| o.is_err()).count() as i64;
        assert_eq!(
            derive_message_status(outcomes.len() as i64, failed),
            MessageStatus::Sent
        );
    }

    #[tokio::test]
    async fn dispatch_with_everyone_failing_derives_failed() {
        let gateway = MockGateway {
            failing: vec!["+254700000001".to_string(), "+254700000002".to_string()],
        };
        let phones = vec!["+254700000001".to_string(), "+254700000002".to_string()];

        let outcomes = run_dispatch(&gateway, "oferta do dia", &phones).await;
        let failed = outcomes.iter().filter(|o| o.is_err()).count() as i64;

        assert_eq!(
            derive_message_status(outcomes.len() as i64, failed),
            MessageStatus::Failed
        );
    }

    #[tokio::test]
    async fn successful_dispatch_carries_provider_id() {
        let gateway = MockGateway { failing: vec![] };
        let phones = vec!["+254711222333".to_string()];

        let outcomes = run_dispatch(&gateway, "olá", &phones).await;
        let dispatch = outcomes[0].as_ref().unwrap();
        assert_eq!(
            dispatch.provider_message_id.as_deref(),
            Some("id-+254711222333")
        );
    }
}
