use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error as ThisError;
use tracing::error;

/// Error taxonomy for the service, one kind per component boundary.
///
/// The 500-class kinds carry internal detail for server-side logs only;
/// `into_response` replaces it with a fixed message so credentials, driver
/// text, and provider internals never reach the caller. `Validation` is the
/// caller's own mistake and is returned verbatim with a 400.
#[derive(Debug, ThisError)]
pub enum ProbeError {
    #[error("configuration error: {0}")]
    Configuration(&'static str),

    #[error("authentication failure: {0}")]
    Authentication(String),

    #[error("database connection failure: {0}")]
    Connection(String),

    #[error("query execution failure: {0}")]
    Query(String),

    #[error("{0}")]
    Validation(String),

    /// Downstream DNS/HTTP target unreachable or erroring. Handlers report
    /// this inline in a 200 body; the response mapping below is a fallback.
    #[error("remote fault: {0}")]
    Remote(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ProbeError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            ProbeError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "VALIDATION_ERROR".to_string(),
                    message: reason.clone(),
                },
            ),
            ProbeError::Configuration(_) => {
                error!(error = %self, "configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "NOT_CONFIGURED".to_string(),
                        message: "Database connection information not configured.".to_string(),
                    },
                )
            }
            ProbeError::Authentication(_) => {
                error!(error = %self, "token acquisition failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "AUTH_FAILED".to_string(),
                        message: "Authentication failed.".to_string(),
                    },
                )
            }
            ProbeError::Connection(_) => {
                error!(error = %self, "database connection failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "DB_CONNECTION_FAILED".to_string(),
                        message: "Database connection failed.".to_string(),
                    },
                )
            }
            ProbeError::Query(_) => {
                error!(error = %self, "query execution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "QUERY_FAILED".to_string(),
                        message: "Database query failed.".to_string(),
                    },
                )
            }
            ProbeError::Remote(_) => {
                error!(error = %self, "unhandled remote fault");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorBody {
                        code: "REMOTE_FAULT".to_string(),
                        message: "Downstream target unreachable.".to_string(),
                    },
                )
            }
            ProbeError::Internal(_) => {
                error!(error = %self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "INTERNAL_ERROR".to_string(),
                        message: "An internal server error occurred.".to_string(),
                    },
                )
            }
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
