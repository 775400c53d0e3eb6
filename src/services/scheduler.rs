// src/services/scheduler.rs

use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};

use crate::{
    common::error::AppError,
    db::MessageRepository,
    models::messaging::MessageStatus,
    services::message_service::MessageService,
};

const TICK_INTERVAL: Duration = Duration::from_secs(60);

// Varredura periódica das mensagens agendadas. Uma única task com awaits
// sequenciais: um tick nunca sobrepõe o anterior (MissedTickBehavior::Delay
// apenas atrasa o próximo).
pub struct MessageScheduler {
    message_repo: MessageRepository,
    message_service: MessageService,
}

impl MessageScheduler {
    pub fn new(message_repo: MessageRepository, message_service: MessageService) -> Self {
        Self {
            message_repo,
            message_service,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(TICK_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("⏰ Scheduler de mensagens agendadas iniciado (tick de 60s).");

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_tick().await {
                    tracing::error!("Falha no tick do scheduler: {}", e);
                }
            }
        })
    }

    // Sem estado entre ticks: re-consulta a tabela a cada passagem. Falha em
    // uma mensagem não afeta as demais.
    async fn run_tick(&self) -> Result<(), AppError> {
        let due = self.message_repo.find_due_scheduled(Utc::now()).await?;
        if due.is_empty() {
            return Ok(());
        }

        tracing::info!("Scheduler: {} mensagem(ns) vencida(s).", due.len());

        for message in due {
            if let Err(e) = self
                .message_repo
                .set_status(message.id, MessageStatus::Pending)
                .await
            {
                tracing::error!("Não foi possível liberar a mensagem {}: {}", message.id, e);
                continue;
            }

            if let Err(e) = self.message_service.send_message(message.id).await {
                tracing::error!("Envio agendado da mensagem {} falhou: {}", message.id, e);
            }
        }

        Ok(())
    }
}
