//! Create-option session endpoints

use alloy::primitives::{Address, TxHash};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::options::params::{format_units, parse_address, OptionForm, QUOTE_DECIMALS};
use crate::types::{unix_now, ApiError, ApiResult};
use crate::workflow::session::SESSION_TTL;
use crate::workflow::{PendingAction, WorkflowSession, WorkflowStatus};

#[derive(Debug, Serialize)]
pub struct StatusInfo {
    pub state: PendingAction,
    pub label: &'static str,
    /// Allowance in USDC, `None` while unknown
    pub allowance: Option<String>,
    pub required_allowance: Option<String>,
    pub approval_tx: Option<TxHash>,
    pub create_tx: Option<TxHash>,
    pub poll_attempts: u32,
    pub error: Option<String>,
}

impl From<WorkflowStatus> for StatusInfo {
    fn from(s: WorkflowStatus) -> Self {
        Self {
            state: s.state,
            label: s.label,
            allowance: s.allowance.map(|a| format_units(a, QUOTE_DECIMALS)),
            required_allowance: s.required_allowance.map(|a| format_units(a, QUOTE_DECIMALS)),
            approval_tx: s.approval_tx,
            create_tx: s.create_tx,
            poll_attempts: s.poll_attempts,
            error: s.last_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub owner: Option<Address>,
    pub created_at: u64,
    pub expires_at: u64,
    pub status: StatusInfo,
}

impl From<&WorkflowSession> for SessionResponse {
    fn from(session: &WorkflowSession) -> Self {
        let created_at = unix_now().saturating_sub(session.created_at.elapsed().as_secs());
        Self {
            session_id: session.id.clone(),
            owner: session.owner,
            created_at,
            expires_at: created_at + SESSION_TTL.as_secs(),
            status: session.status().into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Connected wallet, absent when no wallet is connected
    pub owner: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitQuery {
    /// Respond only once the submission has finished
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub session_id: String,
}

async fn find_session(
    state: &AppState,
    id: &str,
) -> ApiResult<std::sync::Arc<WorkflowSession>> {
    state
        .session_manager
        .get_session(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", id)))
}

/// POST /api/session - Mount a form session and check the allowance
pub async fn create_session(
    State(state): State<AppState>,
    req: Option<Json<CreateSessionRequest>>,
) -> ApiResult<Json<SessionResponse>> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let owner = req
        .owner
        .as_deref()
        .filter(|o| !o.trim().is_empty())
        .map(|o| parse_address("owner", o))
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let session = state.session_manager.create_session(owner).await;
    Ok(Json(SessionResponse::from(session.as_ref())))
}

/// GET /api/session/:id - Current workflow status
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = find_session(&state, &id).await?;
    Ok(Json(SessionResponse::from(session.as_ref())))
}

/// DELETE /api/session/:id - End the session, abandoning in-flight work
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state
        .session_manager
        .remove_session(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", id)))?;

    Ok(Json(DeleteResponse {
        success: true,
        session_id: id,
    }))
}

/// POST /api/session/:id/submit - Submit the create-option form
///
/// Answers 202 once the submission is running, or with the final status
/// when `?wait=true`.
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SubmitQuery>,
    Json(form): Json<OptionForm>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let session = find_session(&state, &id).await?;
    let handle = session.submit(form)?;

    if !query.wait {
        return Ok((
            StatusCode::ACCEPTED,
            Json(SessionResponse::from(session.as_ref())),
        ));
    }

    handle
        .await
        .map_err(|e| ApiError::Internal(format!("Submission task failed: {}", e)))??;

    Ok((StatusCode::OK, Json(SessionResponse::from(session.as_ref()))))
}

/// POST /api/session/:id/recheck - Re-read the allowance
pub async fn recheck(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = find_session(&state, &id).await?;
    session.recheck().await?;
    Ok(Json(SessionResponse::from(session.as_ref())))
}
