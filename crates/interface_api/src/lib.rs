//! HTTP API Layer
//!
//! REST surface for the claims delegation workflow using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: conversations, direct stage invocation, storage read-back
//! - **Middleware**: authentication, tracing, audit logging
//! - **Sessions**: one locked [`ClaimSession`](domain_claims::ClaimSession) per conversation
//! - **Error Handling**: consistent JSON error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::from_config(config).await?;
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod sessions;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use domain_claims::{
    ClaimValidator, FormatterAgent, ObjectStorePort, Orchestrator, Persist, PostAdjudicationChecker,
};
use infra_storage::build_store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::StartupError;
use crate::handlers::{agents, conversations, health, storage};
use crate::middleware::{audit_middleware, auth_middleware};
use crate::sessions::SessionStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn ObjectStorePort>,
    pub sessions: SessionStore,
}

impl AppState {
    /// Wires the stages around an existing store
    pub fn new(config: ApiConfig, store: Arc<dyn ObjectStorePort>) -> Result<Self, StartupError> {
        let persist = Persist::new(store.clone(), config.persist_config());
        let validator = ClaimValidator::new(config.validator_config()).with_persist(persist);
        let formatter = FormatterAgent::new(config.formatter_config());
        let checker = PostAdjudicationChecker::with_policy(config.checker_policy()?);

        let orchestrator = Orchestrator::new(
            Arc::new(validator),
            Arc::new(formatter),
            Arc::new(checker),
            config.orchestrator_config(),
        );

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            store,
            sessions: SessionStore::new(),
        })
    }

    /// Builds the configured store, then the stages
    pub async fn from_config(config: ApiConfig) -> Result<Self, StartupError> {
        let store = build_store(&config.storage_config()?).await?;
        Self::new(config, store)
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let conversation_routes = Router::new()
        .route("/", post(conversations::open_conversation))
        .route(
            "/:id",
            get(conversations::get_conversation).delete(conversations::close_conversation),
        )
        .route("/:id/messages", post(conversations::submit_message));

    let agent_routes = Router::new()
        .route("/", get(agents::list_agents))
        .route("/:name/respond", post(agents::respond));

    let storage_routes = Router::new().route("/:bucket/*key", get(storage::get_object));

    // Protected API routes; auth runs first so audit sees the user
    let api_routes = Router::new()
        .nest("/conversations", conversation_routes)
        .nest("/agents", agent_routes)
        .nest("/storage", storage_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
