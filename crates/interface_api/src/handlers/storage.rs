//! Read-back of persisted objects

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};

use crate::auth::{permissions, require_permission, Claims};
use crate::error::ApiError;
use crate::AppState;

/// Returns the stored bytes, labelled JSON when they parse as JSON
pub async fn get_object(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    require_permission(&claims, permissions::CLAIM_READ)?;

    let bytes = state.store.get_object(&bucket, &key, None).await?;
    let content_type = if serde_json::from_slice::<serde_json::Value>(&bytes).is_ok() {
        "application/json"
    } else {
        "application/octet-stream"
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
