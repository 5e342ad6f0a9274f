use {
    crate::domain::{error::BillingError, message::MessagePattern},
    chrono::{DateTime, Utc},
    serde::Serialize,
    serde_json::Value,
    uuid::Uuid,
};

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub pattern: String,
    pub payload: Value,
    pub attempts: i32,
}

/// Reply-correlation view of one queued message.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MessageStatus {
    pub id: Uuid,
    pub pattern: String,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub reply: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enqueue a message for the worker. Returns the message id and `true` if
/// inserted, `false` if `dedup_key` was already enqueued (the existing id is
/// returned).
pub async fn enqueue(
    pool: &sqlx::PgPool,
    pattern: MessagePattern,
    payload: &Value,
    dedup_key: Option<&str>,
) -> Result<(Uuid, bool), BillingError> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO inbound_messages (id, dedup_key, pattern, payload)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (dedup_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(dedup_key)
    .bind(pattern.to_string())
    .bind(payload)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = inserted {
        return Ok((id, true));
    }

    let existing: Uuid =
        sqlx::query_scalar("SELECT id FROM inbound_messages WHERE dedup_key = $1")
            .bind(dedup_key)
            .fetch_one(pool)
            .await?;
    Ok((existing, false))
}

/// Claim up to `limit` pending messages for processing.
/// Uses SKIP LOCKED to avoid contention with other workers.
pub async fn claim(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    limit: i64,
) -> Result<Vec<MessageRow>, BillingError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        UPDATE inbound_messages
        SET status = 'processing', updated_at = now()
        WHERE id IN (
            SELECT id FROM inbound_messages
            WHERE status = 'pending' AND scheduled_at <= now()
            ORDER BY scheduled_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, pattern, payload, attempts
        "#,
    )
    .bind(limit)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Store the reply and mark the message completed.
pub async fn complete(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    reply: &Value,
) -> Result<(), BillingError> {
    sqlx::query(
        r#"
        UPDATE inbound_messages
        SET status = 'completed', reply = $2, attempts = attempts + 1, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(reply)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Terminal failure that redelivery cannot fix. The error reply is stored
/// so the caller can read why.
pub async fn reject(
    pool: &sqlx::PgPool,
    id: Uuid,
    reply: &Value,
    error: &str,
) -> Result<(), BillingError> {
    sqlx::query(
        r#"
        UPDATE inbound_messages
        SET status = 'failed', reply = $2, last_error = $3,
            attempts = attempts + 1, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(reply)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a retryable failure. Exponential backoff via scheduled_at.
/// If max attempts reached, mark as 'failed' permanently.
pub async fn fail(pool: &sqlx::PgPool, id: Uuid, error: &str) -> Result<(), BillingError> {
    sqlx::query(
        r#"
        UPDATE inbound_messages
        SET attempts = attempts + 1,
            last_error = $2,
            status = CASE
                WHEN attempts + 1 >= max_attempts THEN 'failed'
                ELSE 'pending'
            END,
            scheduled_at = CASE
                WHEN attempts + 1 >= max_attempts THEN scheduled_at
                ELSE now() + make_interval(secs => power(2, attempts + 1)::int)
            END,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Reset messages stuck in 'processing' for >2 minutes back to 'pending'.
/// Returns the number of reaped messages.
pub async fn reap_stale(pool: &sqlx::PgPool) -> Result<u64, BillingError> {
    let result = sqlx::query(
        r#"
        UPDATE inbound_messages
        SET status = 'pending', updated_at = now()
        WHERE status = 'processing' AND updated_at < now() - interval '2 minutes'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn get(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<MessageStatus>, BillingError> {
    let row = sqlx::query_as::<_, MessageStatus>(
        r#"
        SELECT id, pattern, status, attempts, last_error, reply, created_at, updated_at
        FROM inbound_messages
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
