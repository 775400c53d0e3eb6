// src/db/message_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::messaging::{
        Message, MessageRecipient, MessageStatus, RecipientStatus, RecipientType,
        SmsProviderConfig,
    },
};

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Mensagens
    // ---

    pub async fn find_message(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    pub async fn list_messages(&self) -> Result<Vec<Message>, AppError> {
        let messages =
            sqlx::query_as::<_, Message>("SELECT * FROM messages ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(messages)
    }

    pub async fn create_message<'e, E>(
        &self,
        executor: E,
        title: &str,
        body: &str,
        status: MessageStatus,
        recipient_type: RecipientType,
        recipient_id: Uuid,
        scheduled_at: Option<DateTime<Utc>>,
        created_by: Uuid,
    ) -> Result<Message, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (title, body, status, recipient_type, recipient_id, scheduled_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(body)
        .bind(status)
        .bind(recipient_type)
        .bind(recipient_id)
        .bind(scheduled_at)
        .bind(created_by)
        .fetch_one(executor)
        .await?;
        Ok(message)
    }

    pub async fn set_status(&self, id: Uuid, status: MessageStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE messages SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_sent(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE messages SET status = 'SENT', sent_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Mensagens agendadas cuja hora já passou: o que o scheduler varre a
    // cada tick.
    pub async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE status = 'SCHEDULED' AND scheduled_at <= $1
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    // ---
    // Destinatários
    // ---

    pub async fn create_recipient<'e, E>(
        &self,
        executor: E,
        message_id: Uuid,
        contact_id: Uuid,
        phone: &str,
    ) -> Result<MessageRecipient, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let recipient = sqlx::query_as::<_, MessageRecipient>(
            r#"
            INSERT INTO message_recipients (message_id, contact_id, phone)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(contact_id)
        .bind(phone)
        .fetch_one(executor)
        .await?;
        Ok(recipient)
    }

    pub async fn recipients_of(&self, message_id: Uuid) -> Result<Vec<MessageRecipient>, AppError> {
        let recipients = sqlx::query_as::<_, MessageRecipient>(
            "SELECT * FROM message_recipients WHERE message_id = $1 ORDER BY phone ASC",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(recipients)
    }

    // Só os que ainda precisam de envio. DELIVERED já passou por SENT e foi
    // confirmado pelo provedor: reenvio também pula esses.
    pub async fn unsent_recipients(
        &self,
        message_id: Uuid,
    ) -> Result<Vec<MessageRecipient>, AppError> {
        let recipients = sqlx::query_as::<_, MessageRecipient>(
            r#"
            SELECT * FROM message_recipients
            WHERE message_id = $1 AND status NOT IN ('SENT', 'DELIVERED')
            ORDER BY phone ASC
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(recipients)
    }

    pub async fn mark_recipient_sent(
        &self,
        recipient_id: Uuid,
        provider_message_id: Option<&str>,
        provider_response: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE message_recipients
            SET status = 'SENT', provider_message_id = $2, provider_response = $3,
                error_message = NULL, sent_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(recipient_id)
        .bind(provider_message_id)
        .bind(provider_response)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_recipient_failed(
        &self,
        recipient_id: Uuid,
        error_message: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE message_recipients SET status = 'FAILED', error_message = $2 WHERE id = $1",
        )
        .bind(recipient_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn reset_failed_recipients(&self, message_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE message_recipients
            SET status = 'PENDING', error_message = NULL
            WHERE message_id = $1 AND status = 'FAILED'
            "#,
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // (total, falhos) entre TODOS os destinatários da mensagem: é a base da
    // derivação do status final (FAILED apenas se todos falharam).
    pub async fn recipient_counts(&self, message_id: Uuid) -> Result<(i64, i64), AppError> {
        let (total, failed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'FAILED')
            FROM message_recipients
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((total, failed))
    }

    pub async fn set_recipient_delivery(
        &self,
        provider_message_id: &str,
        status: RecipientStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE message_recipients SET status = $2 WHERE provider_message_id = $1",
        )
        .bind(provider_message_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Configuração do provedor
    // ---

    pub async fn active_provider_config(&self) -> Result<Option<SmsProviderConfig>, AppError> {
        let config = sqlx::query_as::<_, SmsProviderConfig>(
            "SELECT * FROM sms_provider_config WHERE is_active = TRUE ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(config)
    }

    // Desativa a configuração anterior e grava a nova como ativa.
    pub async fn upsert_provider_config(
        &self,
        provider: &str,
        api_url: &str,
        api_key: &str,
        sender_id: Option<&str>,
    ) -> Result<SmsProviderConfig, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE sms_provider_config SET is_active = FALSE WHERE is_active = TRUE")
            .execute(&mut *tx)
            .await?;

        let config = sqlx::query_as::<_, SmsProviderConfig>(
            r#"
            INSERT INTO sms_provider_config (provider, api_url, api_key, sender_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(provider)
        .bind(api_url)
        .bind(api_key)
        .bind(sender_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(config)
    }
}
