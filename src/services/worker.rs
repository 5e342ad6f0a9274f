use {
    super::dispatch::{BillingService, CheckoutEvent},
    crate::domain::{
        audit::NewAuditEntry,
        error::BillingError,
        message::{Message, MessagePattern},
    },
    crate::infra::postgres::{audit_repo::insert_audit_entry, message_repo},
    serde_json::json,
    sqlx::PgPool,
    tokio::sync::watch,
    uuid::Uuid,
};

const ACTOR: &str = "worker:billing";

/// Poll for pending messages and dispatch them to the billing handlers.
pub async fn run_worker(pool: PgPool, billing: BillingService, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("message worker started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("message worker shutting down");
                return;
            }
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
        }

        if let Err(e) = poll_once(&pool, &billing).await {
            tracing::error!(error = %e, "worker poll error");
        }
    }
}

/// Claims one batch and processes it. Returns how many messages were claimed.
pub async fn poll_once(pool: &PgPool, billing: &BillingService) -> Result<usize, BillingError> {
    let mut tx = pool.begin().await?;
    let messages = message_repo::claim(&mut tx, 10).await?;
    tx.commit().await?;

    let claimed = messages.len();
    for row in messages {
        let decoded = row
            .pattern
            .parse::<MessagePattern>()
            .and_then(|pattern| Message::decode(pattern, row.payload));
        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(message_id = %row.id, error = %e, "undecodable message, rejecting");
                message_repo::reject(pool, row.id, &error_reply(&e), &e.to_string()).await?;
                continue;
            }
        };

        match billing.handle(message, Some(row.id)).await {
            Ok(handled) => {
                let mut tx = pool.begin().await?;
                if let Some(event) = handled.event {
                    insert_audit_entry(&mut tx, &audit_entry(row.id, event)).await?;
                }
                message_repo::complete(&mut tx, row.id, &handled.reply).await?;
                tx.commit().await?;
                tracing::info!(message_id = %row.id, pattern = %row.pattern, "message processed");
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(message_id = %row.id, attempts = row.attempts, error = %e, "message failed, scheduling retry");
                message_repo::fail(pool, row.id, &e.to_string()).await?;
            }
            Err(e) => {
                tracing::warn!(message_id = %row.id, error = %e, "non-retryable error, rejecting");
                message_repo::reject(pool, row.id, &error_reply(&e), &e.to_string()).await?;
            }
        }
    }

    Ok(claimed)
}

/// Periodically reset messages stuck in 'processing' back to 'pending'.
pub async fn run_reaper(pool: PgPool, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("stale message reaper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("stale message reaper shutting down");
                return;
            }
            _ = tokio::time::sleep(std::time::Duration::from_secs(60)) => {}
        }

        match message_repo::reap_stale(&pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "reaped stale messages"),
            Err(e) => tracing::error!(error = %e, "reaper error"),
        }
    }
}

pub fn error_reply(err: &BillingError) -> serde_json::Value {
    json!({
        "error_code": err.code(),
        "message": err.to_string(),
    })
}

fn audit_entry(message_id: Uuid, event: CheckoutEvent) -> NewAuditEntry {
    NewAuditEntry {
        id: Uuid::now_v7(),
        entity_type: event.entity_type.to_string(),
        entity_ref: event.entity_ref,
        message_id: Some(message_id),
        action: event.action.to_string(),
        actor: ACTOR.to_string(),
        detail: event.detail,
    }
}
