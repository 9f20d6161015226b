//! HTTP API tests

use axum::http::StatusCode;
use axum_test::TestServer;
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState};
use serde_json::{json, Value};
use test_utils::{memory_store, AdjudicatedClaimBuilder, InputFixtures, RuleFixtures, INTAKE_BUCKET};

const SECRET: &str = "api-test-secret";

fn server() -> TestServer {
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..ApiConfig::default()
    };
    let state = AppState::new(config, memory_store()).unwrap();
    TestServer::new(create_router(state)).unwrap()
}

fn token(roles: &[&str]) -> String {
    create_token(
        "intake-clerk",
        roles.iter().map(|r| r.to_string()).collect(),
        SECRET,
        300,
    )
    .unwrap()
}

fn writer() -> String {
    token(&[permissions::CLAIM_READ, permissions::CLAIM_WRITE])
}

async fn open(server: &TestServer, body: Value) -> String {
    let response = server
        .post("/api/v1/conversations")
        .authorization_bearer(writer())
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["conversation_id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let server = server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");

    let ready = server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<Value>()["storage"]["status"], "healthy");
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let server = server();
    server
        .get("/api/v1/agents")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/v1/agents")
        .authorization_bearer("not-a-jwt")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_agents_are_listed() {
    let server = server();
    let response = server
        .get("/api/v1/agents")
        .authorization_bearer(writer())
        .await;
    response.assert_status_ok();

    let names: Vec<String> = response
        .json::<Vec<Value>>()
        .iter()
        .filter_map(|a| a["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(
        names,
        vec![
            "root_agent",
            "claim_validator",
            "formatter_agent",
            "post_adjudication_check_agent"
        ]
    );
}

// ============================================================================
// Conversations
// ============================================================================

#[tokio::test]
async fn test_intake_walkthrough() {
    let server = server();
    let id = open(&server, json!({"storage": {"bucket": INTAKE_BUCKET}})).await;

    let first = server
        .post(&format!("/api/v1/conversations/{}/messages", id))
        .authorization_bearer(writer())
        .json(&json!({"input": InputFixtures::name_only()}))
        .await;
    first.assert_status_ok();
    let body = first.json::<Value>();
    assert_eq!(body["state"], "needs_input");
    assert_eq!(body["report"]["trail"][0]["message"]["missing_fields"], json!(["MemberID"]));

    let second = server
        .post(&format!("/api/v1/conversations/{}/messages", id))
        .authorization_bearer(writer())
        .json(&json!({"input": "MEM1234553"}))
        .await;
    second.assert_status_ok();
    let body = second.json::<Value>();
    assert_eq!(body["state"], "done");

    let trail = body["report"]["trail"].as_array().unwrap();
    assert_eq!(trail[0]["agent"], "claim_validator");
    assert_eq!(
        trail[0]["message"]["draft"],
        json!({"Name": "Corey Maher", "MemberID": "MEM1234553"})
    );
    assert_eq!(trail[0]["message"]["persistence"]["status"], "success");
    assert_eq!(trail[1]["agent"], "formatter_agent");
    let edi = trail[1]["message"]["document"]["text"].as_str().unwrap();
    assert!(edi.starts_with("ISA*"));
    assert!(edi.contains("MEM1234553"));

    let conversation = server
        .get(&format!("/api/v1/conversations/{}", id))
        .authorization_bearer(writer())
        .await;
    conversation.assert_status_ok();
    let body = conversation.json::<Value>();
    assert_eq!(body["state"], "done");
    assert_eq!(body["turns"].as_array().map(Vec::len), Some(5));

    let uuid = id.trim_start_matches("CNV-");
    let stored = server
        .get(&format!("/api/v1/storage/{}/claims/{}.json", INTAKE_BUCKET, uuid))
        .authorization_bearer(writer())
        .await;
    stored.assert_status_ok();
    assert_eq!(
        stored.json::<Value>(),
        json!({"Name": "Corey Maher", "MemberID": "MEM1234553"})
    );
}

#[tokio::test]
async fn test_unknown_conversation() {
    let server = server();
    server
        .get("/api/v1/conversations/CNV-00000000-0000-0000-0000-000000000000")
        .authorization_bearer(writer())
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/v1/conversations/not-an-id")
        .authorization_bearer(writer())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_close_conversation() {
    let server = server();
    let id = open(&server, json!({})).await;
    let path = format!("/api/v1/conversations/{}", id);

    server
        .delete(&path)
        .authorization_bearer(token(&[permissions::CLAIM_READ]))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .delete(&path)
        .authorization_bearer(writer())
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&path)
        .authorization_bearer(writer())
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&path)
        .authorization_bearer(writer())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_input_is_rejected() {
    let server = server();
    let id = open(&server, json!({})).await;
    server
        .post(&format!("/api/v1/conversations/{}/messages", id))
        .authorization_bearer(writer())
        .json(&json!({"input": "   "}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_review_needs_review_permission() {
    let server = server();
    let id = open(&server, json!({})).await;
    let review = json!({
        "claim": AdjudicatedClaimBuilder::new()
            .with_issue("Member address does not match our records")
            .build(),
        "instructions": RuleFixtures::address_rule(),
    });

    server
        .post(&format!("/api/v1/conversations/{}/messages", id))
        .authorization_bearer(writer())
        .json(&json!({"input": review}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post(&format!("/api/v1/conversations/{}/messages", id))
        .authorization_bearer(token(&[permissions::CLAIM_WRITE, permissions::CLAIM_REVIEW]))
        .json(&json!({"input": review}))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["report"]["trail"][0]["message"]["outcome"]["type"], "member_notice");
}

// ============================================================================
// Direct stage invocation
// ============================================================================

#[tokio::test]
async fn test_formatter_rejects_incomplete_draft() {
    let server = server();
    let response = server
        .post("/api/v1/agents/formatter_agent/respond")
        .authorization_bearer(writer())
        .json(&json!({"inputs": [InputFixtures::name_only()]}))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["message"]["kind"], "rejected");
    assert_eq!(body["message"]["fields"], json!(["MemberID"]));
}

#[tokio::test]
async fn test_validator_persists_to_requested_bucket() {
    let server = server();
    let response = server
        .post("/api/v1/agents/claim_validator/respond")
        .authorization_bearer(writer())
        .json(&json!({
            "inputs": [InputFixtures::minimal_claim()],
            "storage": {"bucket": INTAKE_BUCKET, "key": "claims/walk-in.json"}
        }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["message"]["kind"], "claim_draft");
    assert_eq!(
        body["message"]["persistence"]["message"],
        "Successfully saved to memory://claims-intake/claims/walk-in.json"
    );
}

#[tokio::test]
async fn test_checker_route_requires_review_permission() {
    let server = server();
    let review = json!({
        "claim": AdjudicatedClaimBuilder::new().with_issue("Rendering provider NPI mismatch").build(),
        "instructions": RuleFixtures::provider_rule(),
    });

    server
        .post("/api/v1/agents/post_adjudication_check_agent/respond")
        .authorization_bearer(writer())
        .json(&json!({"inputs": [review.clone()]}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post("/api/v1/agents/post_adjudication_check_agent/respond")
        .authorization_bearer(token(&[permissions::CLAIM_REVIEW]))
        .json(&json!({"inputs": [review]}))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["message"]["outcome"]["type"],
        "operations_summary"
    );
}

#[tokio::test]
async fn test_unknown_agent() {
    let server = server();
    server
        .post("/api/v1/agents/root_agent/respond")
        .authorization_bearer(writer())
        .json(&json!({"inputs": ["hello"]}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_object() {
    let server = server();
    server
        .get(&format!("/api/v1/storage/{}/claims/absent.json", INTAKE_BUCKET))
        .authorization_bearer(writer())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shared_store_sees_session_writes() {
    let store = memory_store();
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..ApiConfig::default()
    };
    let server = TestServer::new(create_router(AppState::new(config, store.clone()).unwrap())).unwrap();
    let id = open(&server, json!({"storage": {"bucket": INTAKE_BUCKET}})).await;
    server
        .post(&format!("/api/v1/conversations/{}/messages", id))
        .authorization_bearer(writer())
        .json(&json!({"input": InputFixtures::minimal_claim()}))
        .await
        .assert_status_ok();

    let keys = store.list_keys(INTAKE_BUCKET).await.unwrap();
    assert_eq!(keys.len(), 1);
}
