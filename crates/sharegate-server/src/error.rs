use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use sharegate_shared::ChainId;
use sharegate_store::StoreError;

use crate::oracle::OracleError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Request must be signed by the author of the contract")]
    UnauthorizedSigner,

    #[error("Signer must hold at least 1 share token (holds {held})")]
    InsufficientHolding { held: String },

    #[error("No chat is configured for this share")]
    ChatNotConfigured,

    #[error("Binding is already signed")]
    AlreadySigned,

    #[error("Invite has already been used")]
    AlreadyResolved,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Chain {0} is not supported")]
    UnsupportedChain(ChainId),

    #[error("Chain RPC unavailable: {0}")]
    ChainUnavailable(String),

    #[error("Contract call failed: {0}")]
    ContractError(String),

    #[error("Could not create invite link: {0}")]
    InviteCreationFailed(String),

    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidSignature
            | ServerError::UnsupportedChain(_)
            | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::UnauthorizedSigner | ServerError::InsufficientHolding { .. } => {
                StatusCode::FORBIDDEN
            }
            ServerError::NotFound(_) | ServerError::ChatNotConfigured => StatusCode::NOT_FOUND,
            ServerError::AlreadySigned | ServerError::AlreadyResolved => StatusCode::CONFLICT,
            ServerError::ContractError(_) | ServerError::InviteCreationFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            ServerError::ChainUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::StorageConflict(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServerError::NotFound("record".to_string()),
            StoreError::Conflict(msg) => ServerError::StorageConflict(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<OracleError> for ServerError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::UnsupportedChain(chain_id) => ServerError::UnsupportedChain(chain_id),
            OracleError::ChainUnavailable(msg) => ServerError::ChainUnavailable(msg),
            OracleError::ContractError(msg) => ServerError::ContractError(msg),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::StorageConflict(_) | ServerError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            // Upstream detail may name the RPC endpoint.
            ServerError::ChainUnavailable(_) => {
                tracing::warn!(error = %self, "chain request failed");
                "Chain RPC unavailable".to_string()
            }
            ServerError::ContractError(_) => {
                tracing::warn!(error = %self, "contract call failed");
                "Contract call failed".to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServerError::InvalidSignature.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ServerError::UnauthorizedSigner.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServerError::InsufficientHolding { held: "0".into() }.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ServerError::ChatNotConfigured.status(), StatusCode::NOT_FOUND);
        assert_eq!(ServerError::AlreadySigned.status(), StatusCode::CONFLICT);
        assert_eq!(
            ServerError::ChainUnavailable("timeout".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::StorageConflict("dup".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_upstream_detail_is_not_returned() {
        for err in [
            ServerError::ChainUnavailable("http://rpc.example/v3/abc123".into()),
            ServerError::ContractError("http://rpc.example/v3/abc123 reverted".into()),
        ] {
            let response = err.into_response();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
            let message = body["error"].as_str().unwrap();
            assert!(!message.contains("abc123"));
        }
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            ServerError::from(StoreError::Conflict("invite_link".into())),
            ServerError::StorageConflict(_)
        ));
        assert!(matches!(
            ServerError::from(StoreError::NotFound),
            ServerError::NotFound(_)
        ));
    }
}
