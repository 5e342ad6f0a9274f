use uuid::Uuid;

/// Row for the append-only audit log. Written by the message worker, never by
/// the billing components themselves.
pub struct NewAuditEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_ref: String,
    pub message_id: Option<Uuid>,
    pub action: String,
    pub actor: String,
    pub detail: serde_json::Value,
}
