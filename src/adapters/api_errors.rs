use crate::domain::error::BillingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype so the domain error can implement axum's `IntoResponse`.
pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillingError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BillingError::ResourceMissing(_) => StatusCode::NOT_FOUND,
            BillingError::AggregationEmpty | BillingError::ConfirmationFailed(_) => {
                StatusCode::CONFLICT
            }
            BillingError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BillingError::Database(_) | BillingError::Serialization(_) | BillingError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };

        let body = serde_json::json!({
            "error_code": self.0.code(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
