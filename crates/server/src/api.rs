//! JSON endpoints over the agent runtime.
//!
//! `POST /api/agent` runs one conversational turn. The session lookups are read-only and
//! never create a session.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ratedesk_agent::{AgentRequest, AgentResponse, AgentRuntime};
use ratedesk_core::{ApplicationError, InterfaceError, NegotiationOutcome, Session, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

pub const CORRELATION_HEADER: &str = "x-correlation-id";
const MALFORMED_REQUEST: &str = "Missing sessionId or message";

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Status plus the user-facing message rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(what: &str) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: format!("{what} not found") }
    }
}

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        match &value {
            InterfaceError::BadRequest { message, .. } => {
                Self { status: StatusCode::BAD_REQUEST, message: message.clone() }
            }
            InterfaceError::ServiceUnavailable { .. } => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: value.user_message().to_string(),
            },
            InterfaceError::Internal { .. } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: value.user_message().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/api/agent", post(agent_turn))
        .route("/api/sessions/{id}", get(session_state))
        .route("/api/sessions/{id}/outcome", get(session_outcome))
        .with_state(ApiState { runtime })
}

async fn agent_turn(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(
                event_name = "api.agent.rejected",
                correlation_id = %correlation_id,
                reason = %rejection.body_text(),
                "agent request body could not be parsed"
            );
            return Err(ApplicationError::MalformedRequest(MALFORMED_REQUEST.to_string())
                .into_interface(correlation_id)
                .into());
        }
    };

    state
        .runtime
        .handle(request, &correlation_id)
        .await
        .map(Json)
        .map_err(|failure| reject(failure, &correlation_id))
}

async fn session_state(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let correlation_id = correlation_id(&headers);
    match state.runtime.session(&SessionId(id)).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err(ApiError::not_found("session")),
        Err(failure) => Err(reject(failure, &correlation_id)),
    }
}

async fn session_outcome(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<NegotiationOutcome>, ApiError> {
    let correlation_id = correlation_id(&headers);
    match state.runtime.outcome(&SessionId(id)).await {
        Ok(Some(outcome)) => Ok(Json(outcome)),
        Ok(None) => Err(ApiError::not_found("negotiation outcome")),
        Err(failure) => Err(reject(failure, &correlation_id)),
    }
}

fn reject(failure: ApplicationError, correlation_id: &str) -> ApiError {
    let interface = failure.clone().into_interface(correlation_id);
    match &interface {
        InterfaceError::BadRequest { message, .. } => warn!(
            event_name = "api.request.rejected",
            correlation_id = %correlation_id,
            message = %message,
            "request rejected"
        ),
        InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => error!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            error = %failure,
            "request failed"
        ),
    }
    interface.into()
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use ratedesk_agent::{AgentRuntime, DialogueController};
    use ratedesk_core::InMemoryAuditSink;
    use ratedesk_db::{connect_with_settings, migrations, InMemorySessionStore, SqlSessionStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;

    fn memory_app() -> Router {
        router(Arc::new(AgentRuntime::new(
            Arc::new(InMemorySessionStore::default()),
            DialogueController::default(),
            Arc::new(InMemoryAuditSink::default()),
        )))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    fn post_agent(body: &str) -> Request<Body> {
        Request::post("/api/agent")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn agent_turn_returns_reply_and_state() {
        let app = memory_app();
        let body = json!({
            "sessionId": "web-1",
            "message": "My salary is $75,000, I have $50,000 in assets, I am a first-time buyer, and I have 1 car."
        });

        let (status, payload) = send(&app, post_agent(&body.to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["state"]["phase"], "awaiting_consent_bg");
        assert_eq!(payload["state"]["intake"]["salary"], 75_000);
        assert_eq!(payload["state"]["history"].as_array().map(Vec::len), Some(2));
        assert!(payload["reply"].as_str().is_some_and(|reply| reply.contains("background check")));
    }

    #[tokio::test]
    async fn missing_or_blank_fields_are_bad_requests() {
        let app = memory_app();

        for body in [
            r#"{"sessionId":"web-1"}"#,
            r#"{"message":"hello"}"#,
            r#"{"sessionId":"","message":"hello"}"#,
            r#"{"sessionId":"web-1","message":"   "}"#,
            r#"{"sessionId":42,"message":"hello"}"#,
            "not json at all",
        ] {
            let (status, payload) = send(&app, post_agent(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(payload, json!({ "error": "Missing sessionId or message" }));
        }

        let (status, _) = send(&app, get("/api/sessions/web-1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_lookups_do_not_create_sessions() {
        let app = memory_app();

        let (status, payload) = send(&app, get("/api/sessions/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload["error"], "session not found");

        send(&app, post_agent(r#"{"sessionId":"web-2","message":"hi"}"#)).await;

        let (status, payload) = send(&app, get("/api/sessions/web-2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["phase"], "intake");

        let (status, _) = send(&app, get("/api/sessions/web-2/outcome")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn outcome_reports_accepted_negotiation() {
        let app = memory_app();
        for message in [
            "My salary is $75,000, I have $50,000 in assets, I am not a first-time buyer, and I have 1 car.",
            "yes",
            "yes",
            "negotiate",
            "accept",
        ] {
            let body = json!({ "sessionId": "web-3", "message": message });
            let (status, _) = send(&app, post_agent(&body.to_string())).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, payload) = send(&app, get("/api/sessions/web-3/outcome")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["phase"], "final");
        assert_eq!(payload["accepted"], true);
        assert_eq!(payload["notary_done"], true);
        assert_eq!(payload["rounds"], 1);
    }

    #[tokio::test]
    async fn store_failure_maps_to_service_unavailable_with_fixed_message() {
        let pool = connect_with_settings("sqlite::memory:", 1, 1).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        let app = router(Arc::new(AgentRuntime::new(
            Arc::new(SqlSessionStore::new(pool.clone())),
            DialogueController::default(),
            Arc::new(InMemoryAuditSink::default()),
        )));
        pool.close().await;

        let (status, payload) =
            send(&app, post_agent(r#"{"sessionId":"web-4","message":"hello"}"#)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            payload,
            json!({ "error": "The service is temporarily unavailable. Please retry shortly." })
        );
    }
}
