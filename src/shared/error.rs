use axum::{response::IntoResponse, Json};

/// Error taxonomy for the ticket engine.
///
/// Validation and authorization failures are rejected before any write.
/// `MutationFailed` means the primary write definitely did not happen;
/// `AuditFailed` means the mutation is durable but its history entry is
/// not, which callers must surface as a fatal inconsistency rather than
/// retry blindly.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Account deactivated")]
    AccountDeactivated,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Mutation failed: {0}")]
    MutationFailed(String),
    #[error("Audit write failed after mutation: {0}")]
    AuditFailed(String),
}

impl IntoResponse for DeskError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::InvalidStatus(msg) => {
                (StatusCode::BAD_REQUEST, format!("invalid status: {msg}"))
            }
            Self::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::AccountDeactivated => {
                (StatusCode::FORBIDDEN, "account deactivated".to_string())
            }
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::MutationFailed(msg) | Self::AuditFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
