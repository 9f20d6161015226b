//! Direct stage invocation

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use core_kernel::ConversationId;
use domain_claims::{Agent, ClaimError, ConversationContext, UserInput, CHECKER_AGENT};
use tokio::time::timeout;
use tracing::instrument;
use validator::Validate;

use crate::auth::{permissions, require_permission, Claims};
use crate::dto::agents::*;
use crate::error::ApiError;
use crate::AppState;

/// Lists the orchestrator and its stages
pub async fn list_agents(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<AgentInfo>>, ApiError> {
    require_permission(&claims, permissions::CLAIM_READ)?;

    let orchestrator: &dyn Agent = state.orchestrator.as_ref();
    let mut agents = vec![AgentInfo::of(orchestrator)];
    agents.extend(state.orchestrator.stages().into_iter().map(|agent| AgentInfo::of(agent.as_ref())));
    Ok(Json(agents))
}

/// Runs a single stage against a supplied context
#[instrument(skip(state, claims, request), fields(user = %claims.sub))]
pub async fn respond(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(name): Path<String>,
    Json(request): Json<AgentRespondRequest>,
) -> Result<Json<AgentRespondResponse>, ApiError> {
    let permission = if name == CHECKER_AGENT {
        permissions::CLAIM_REVIEW
    } else {
        permissions::CLAIM_WRITE
    };
    require_permission(&claims, permission)?;
    request.validate()?;

    let agent = state
        .orchestrator
        .stage(&name)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("agent {}", name)))?;

    let mut context = request
        .context
        .unwrap_or_else(|| ConversationContext::new(ConversationId::new_v7()));
    if let Some(target) = request.storage {
        context.storage = Some(target.into());
    }
    for value in request.inputs {
        context.push_user(UserInput::from_json(value)?);
    }
    if context.turns.is_empty() {
        return Err(ApiError::Validation("at least one input is required".to_string()));
    }

    let limit = state.orchestrator.config().stage_timeout;
    let message = timeout(limit, agent.respond(&context))
        .await
        .map_err(|_| ClaimError::StageTimeout {
            agent: name.clone(),
            timeout_ms: limit.as_millis() as u64,
        })??;

    Ok(Json(AgentRespondResponse {
        agent: name,
        conversation_id: context.conversation_id.to_string(),
        message,
    }))
}
