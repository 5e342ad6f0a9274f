use {derive_more::Display, thiserror::Error};

/// Classification of a failed provider call. Derived from transport-level
/// facts (HTTP status, client error variant), never from message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ProviderErrorKind {
    #[display("validation")]
    Validation,
    #[display("resource_missing")]
    ResourceMissing,
    #[display("unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Error)]
#[error("{operation} failed ({kind}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub operation: &'static str,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation,
            message: message.into(),
        }
    }

    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, operation, message)
    }

    pub fn missing(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ResourceMissing, operation, message)
    }

    pub fn validation(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Validation, operation, message)
    }
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("validation: {0}")]
    ValidationFailed(String),

    #[error("resource missing: {0}")]
    ResourceMissing(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("cart produced no chargeable lines")]
    AggregationEmpty,

    #[error("payment confirmation failed: {0}")]
    ConfirmationFailed(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),
}

impl BillingError {
    /// Whether redelivering the same message may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::Database(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "validation_failed",
            Self::ResourceMissing(_) => "resource_missing",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::AggregationEmpty => "aggregation_empty",
            Self::ConfirmationFailed(_) => "confirmation_failed",
            Self::Database(_) | Self::Serialization(_) | Self::Config(_) => "internal_error",
        }
    }
}

impl From<ProviderError> for BillingError {
    fn from(err: ProviderError) -> Self {
        match err.kind {
            ProviderErrorKind::Validation => Self::ValidationFailed(err.to_string()),
            ProviderErrorKind::ResourceMissing => Self::ResourceMissing(err.to_string()),
            ProviderErrorKind::Unavailable => Self::ProviderUnavailable(err.to_string()),
        }
    }
}
