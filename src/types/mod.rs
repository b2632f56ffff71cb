//! Shared types and error handling

use std::time::Duration;

use alloy::primitives::{TxHash, U256};
use alloy::providers::PendingTransactionError;
use alloy::transports::TransportError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::options::params::ValidationError;
use crate::workflow::PendingAction;

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::NotSupported(_) => (StatusCode::NOT_IMPLEMENTED, "NOT_SUPPORTED"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Failures talking to the chain through a [`crate::chain::ChainClient`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("receipt unavailable: {0}")]
    PendingTransaction(#[from] PendingTransactionError),

    #[error("failed to decode contract data: {0}")]
    Decode(#[from] alloy::sol_types::Error),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("no transaction hash was returned")]
    MissingTransactionHash,
}

impl From<TransportError> for ChainError {
    /// Node error responses keep their code so callers see the same shape as
    /// sandbox faults.
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => ChainError::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
            },
            None => ChainError::Transport(err),
        }
    }
}

/// Everything that can stop the create-option workflow.
///
/// None of these are fatal: the workflow records the message and goes back to
/// `ready` so the user can try again.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("connect a wallet before creating an option")]
    WalletNotConnected,

    #[error("allowance unknown, could not read it from the chain: {0}")]
    AllowanceRead(#[source] ChainError),

    #[error("USDC approval failed: {0}")]
    ApprovalSubmission(#[source] ChainError),

    #[error("USDC approval not confirmed within {waited:?} (required allowance {required})")]
    ApprovalTimeout { waited: Duration, required: U256 },

    #[error("insufficient USDC allowance: current {current}, required {required}")]
    InsufficientAllowance { current: U256, required: U256 },

    #[error("option creation failed: {0}")]
    CreateSubmission(#[source] ChainError),

    #[error("workflow is {state:?}, submit is only accepted when ready")]
    NotReady { state: PendingAction },

    #[error("{0} is not supported by the deployed option contract")]
    NotSupported(&'static str),
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(_) | WorkflowError::WalletNotConnected => {
                ApiError::BadRequest(err.to_string())
            }
            WorkflowError::NotReady { .. } => ApiError::Conflict(err.to_string()),
            WorkflowError::NotSupported(_) => ApiError::NotSupported(err.to_string()),
            WorkflowError::AllowanceRead(_)
            | WorkflowError::ApprovalSubmission(_)
            | WorkflowError::CreateSubmission(_) => ApiError::Upstream(err.to_string()),
            WorkflowError::ApprovalTimeout { .. } | WorkflowError::InsufficientAllowance { .. } => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}
