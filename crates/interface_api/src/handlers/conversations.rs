//! Conversation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use core_kernel::ConversationId;
use domain_claims::UserInput;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{permissions, require_permission, Claims};
use crate::dto::conversations::*;
use crate::error::ApiError;
use crate::sessions::SharedSession;
use crate::AppState;

fn parse_id(id: &str) -> Result<ConversationId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid conversation id '{}'", id)))
}

async fn find_session(state: &AppState, id: &str) -> Result<(ConversationId, SharedSession), ApiError> {
    let conversation_id = parse_id(id)?;
    let session = state
        .sessions
        .get(&conversation_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("conversation {}", conversation_id)))?;
    Ok((conversation_id, session))
}

/// Opens a claim conversation
pub async fn open_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<OpenConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), ApiError> {
    require_permission(&claims, permissions::CLAIM_WRITE)?;
    request.validate()?;

    let session = state.sessions.open(request.storage.map(Into::into)).await;
    Ok((StatusCode::CREATED, Json(ConversationResponse::from(&session))))
}

/// Gets a conversation with its derived workflow state
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    require_permission(&claims, permissions::CLAIM_READ)?;

    let (_, session) = find_session(&state, &id).await?;
    let session = session.lock().await;
    Ok(Json(ConversationResponse::from(&*session)))
}

/// Submits caller input to the orchestrator
///
/// Reviews of adjudicated claims additionally need `claim:review`.
#[instrument(skip(state, claims, request), fields(user = %claims.sub))]
pub async fn submit_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<SubmitMessageRequest>,
) -> Result<Json<SubmitMessageResponse>, ApiError> {
    require_permission(&claims, permissions::CLAIM_WRITE)?;
    request.validate()?;

    let input = UserInput::from_json(request.input)?;
    if input.is_review() {
        require_permission(&claims, permissions::CLAIM_REVIEW)?;
    }

    let (conversation_id, session) = find_session(&state, &id).await?;
    let mut session = session.lock().await;
    let report = session.submit(&state.orchestrator, input).await?;

    info!(
        conversation_id = %conversation_id,
        state = ?report.final_state,
        stages = ?report.agents(),
        "Input delegated"
    );

    Ok(Json(SubmitMessageResponse {
        conversation_id: conversation_id.to_string(),
        state: session.state(),
        report,
    }))
}

/// Closes a conversation and releases its session
pub async fn close_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_permission(&claims, permissions::CLAIM_WRITE)?;

    let conversation_id = parse_id(&id)?;
    state
        .sessions
        .close(&conversation_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("conversation {}", conversation_id)))?;
    Ok(StatusCode::NO_CONTENT)
}
