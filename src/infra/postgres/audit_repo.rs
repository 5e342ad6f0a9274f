use {crate::domain::audit::NewAuditEntry, crate::domain::error::BillingError};

/// Returns `false` when the message already recorded this action.
pub async fn insert_audit_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &NewAuditEntry,
) -> Result<bool, BillingError> {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_log (id, entity_type, entity_ref, message_id, action, actor, detail)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (message_id, action) WHERE message_id IS NOT NULL DO NOTHING
        "#,
    )
    .bind(entry.id)
    .bind(&entry.entity_type)
    .bind(&entry.entity_ref)
    .bind(entry.message_id)
    .bind(&entry.action)
    .bind(&entry.actor)
    .bind(&entry.detail)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}
