use {
    super::metadata::{self, Metadata},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// User row as owned by the user service. Unknown fields (password hashes and
/// the like) are dropped on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCustomer {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_role() -> String {
    "user".to_string()
}

impl DomainCustomer {
    /// Natural key for provider lookup. `None` means this user does not take
    /// part in billing at all.
    pub fn billing_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn provider_metadata(&self) -> Metadata {
        let id = self.id.to_string();
        let mut meta = Metadata::from([
            (metadata::CUSTOMER_LOCAL_ID.to_string(), id.clone()),
            (metadata::CUSTOMER_INTERNAL_ID.to_string(), id),
            (metadata::CUSTOMER_ROLE.to_string(), self.role.clone()),
            (
                metadata::CUSTOMER_GOOGLE_ID.to_string(),
                self.google_id.clone().unwrap_or_default(),
            ),
            (metadata::SOURCE.to_string(), metadata::SOURCE_VALUE.to_string()),
        ]);
        if let Some(created) = self.created_at {
            meta.insert(metadata::CUSTOMER_CREATED_AT.to_string(), created.to_rfc3339());
        }
        if let Some(updated) = self.updated_at {
            meta.insert(metadata::CUSTOMER_UPDATED_AT.to_string(), updated.to_rfc3339());
        }
        meta
    }
}
