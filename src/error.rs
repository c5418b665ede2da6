use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Upstream broker error: {0}")]
    Upstream(String),

    #[error("Status mismatch: webhook claimed '{claimed}', broker reports '{authoritative}'")]
    Consistency {
        claimed: String,
        authoritative: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Settlement computation errors.
///
/// Configuration problems (admin account) are admin-actionable; vendor data
/// problems name the offending vendor so the merchant can chase them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Admin account details are not properly configured")]
    MissingAdminAccount,

    #[error("Vendor '{vendor}' has incomplete bank details")]
    MissingVendorAccount { vendor: String },

    #[error("Admin percentage {0} is outside the 0..=100 range")]
    InvalidPercentage(String),

    #[error("No vendor-owned items found in order")]
    NoVendorItems,
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                msg.clone(),
            ),
            AppError::Settlement(SettlementError::MissingAdminAccount) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MISSING_ADMIN_ACCOUNT",
                self.to_string(),
            ),
            AppError::Settlement(SettlementError::MissingVendorAccount { .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MISSING_VENDOR_ACCOUNT",
                self.to_string(),
            ),
            AppError::Settlement(_) => {
                (StatusCode::BAD_REQUEST, "SETTLEMENT_ERROR", self.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", msg.clone()),
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED", msg.clone())
            }
            // Retryable: the broker's delivery system redelivers on 5xx
            AppError::Upstream(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_ERROR",
                msg.clone(),
            ),
            AppError::Consistency { .. } => {
                (StatusCode::BAD_REQUEST, "STATUS_MISMATCH", self.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details: None,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::Validation(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            AppError::Upstream(format!("Could not connect to broker: {}", error))
        } else {
            AppError::Upstream(format!("HTTP request error: {}", error))
        }
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_401() {
        let resp = AppError::Authentication("bad signature".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn consistency_errors_map_to_400() {
        let resp = AppError::Consistency {
            claimed: "Completed".into(),
            authoritative: "Pending".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_errors_are_retryable_5xx() {
        let resp = AppError::Upstream("connect timeout".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn vendor_error_names_the_vendor() {
        let err = SettlementError::MissingVendorAccount {
            vendor: "Vendor #7".into(),
        };
        assert!(err.to_string().contains("Vendor #7"));
    }
}
