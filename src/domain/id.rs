use {derive_more::Display, serde::Serialize, uuid::Uuid};

const KEY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9d3b_4c57_a0e8_31f5_b2d7_c940);

/// Idempotency key sent with every create call. Deterministic: the same
/// scope and parts always yield the same key, so redelivered messages replay
/// the original create instead of issuing a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn derive(scope: &str, parts: &[&str]) -> Self {
        let mut name = String::from(scope);
        for part in parts {
            // unit separator keeps ("ab", "c") and ("a", "bc") apart
            name.push('\u{1f}');
            name.push_str(part);
        }
        let id = Uuid::new_v5(&KEY_NAMESPACE, name.as_bytes());
        Self(format!("{scope}-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
