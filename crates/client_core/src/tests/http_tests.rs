use super::*;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Method as HttpMethod, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use shared::{
    domain::{AuthorType, FeatureRequestStatus, TicketMessageId, TicketPriority, TicketStatus},
    error::ErrorCode,
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{FeedbackError, FeedbackOrchestrator};

#[derive(Debug, Clone)]
struct SeenRequest {
    method: String,
    path: String,
    auth: Option<String>,
    body: Option<serde_json::Value>,
}

#[derive(Clone, Default)]
struct FakeApi {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    features: Vec<FeatureRequest>,
    detail: Option<TicketDetail>,
    fail_plain: bool,
    malformed_ok: bool,
}

fn api_error(status: StatusCode, code: ErrorCode, message: &str) -> Response {
    (status, Json(ApiError::new(code, message))).into_response()
}

async fn handle(
    State(api): State<FakeApi>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().trim_start_matches("/api/v1").to_string();
    api.seen.lock().await.push(SeenRequest {
        method: method.to_string(),
        path: path.clone(),
        auth: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).ok(),
    });

    if api.fail_plain {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }

    if api.malformed_ok {
        return (StatusCode::OK, "{\"tickets\": [").into_response();
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match (method.as_str(), segments.as_slice()) {
        ("GET", ["feature-requests"]) => Json(api.features.clone()).into_response(),
        ("POST", ["feature-requests"]) => {
            let Ok(req) = serde_json::from_str::<CreateFeatureRequest>(&body) else {
                return api_error(StatusCode::BAD_REQUEST, ErrorCode::Validation, "bad body");
            };
            let now = Utc::now();
            Json(FeatureRequest {
                id: FeatureRequestId::new_random(),
                title: req.title,
                description: req.description,
                status: FeatureRequestStatus::Pending,
                vote_count: 0,
                has_voted: false,
                comment_count: 0,
                created_at: now,
                updated_at: now,
            })
            .into_response()
        }
        ("POST" | "DELETE", ["feature-requests", _, "vote"]) => {
            StatusCode::NO_CONTENT.into_response()
        }
        ("GET", ["tickets", id]) => match &api.detail {
            Some(detail) if detail.ticket.id.to_string() == *id => {
                Json(detail.clone()).into_response()
            }
            _ => api_error(StatusCode::NOT_FOUND, ErrorCode::NotFound, "ticket not found"),
        },
        ("POST", ["tickets"]) => {
            let Ok(req) = serde_json::from_str::<CreateTicket>(&body) else {
                return api_error(StatusCode::BAD_REQUEST, ErrorCode::Validation, "bad body");
            };
            let now = Utc::now();
            Json(SupportTicket {
                id: TicketId::new_random(),
                subject: req.subject,
                status: TicketStatus::Open,
                priority: TicketPriority::Normal,
                message_count: 1,
                created_at: now,
                updated_at: now,
            })
            .into_response()
        }
        _ => api_error(StatusCode::NOT_FOUND, ErrorCode::NotFound, "no such route"),
    }
}

async fn spawn_fake_api(api: FakeApi) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().fallback(handle).with_state(api);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/api/v1"))
}

fn sample_feature(title: &str) -> FeatureRequest {
    let now = Utc::now();
    FeatureRequest {
        id: FeatureRequestId::new_random(),
        title: title.to_string(),
        description: "Add a dark mode option.".to_string(),
        status: FeatureRequestStatus::Planned,
        vote_count: 42,
        has_voted: false,
        comment_count: 5,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn lists_feature_requests_with_bearer_token() {
    let features = vec![sample_feature("Dark mode support")];
    let api = FakeApi {
        features: features.clone(),
        ..FakeApi::default()
    };
    let seen = Arc::clone(&api.seen);
    let base_url = spawn_fake_api(api).await.expect("spawn api");
    let backend =
        HttpFeedbackBackend::with_client(Client::new(), &base_url, Some("test-key".into()))
            .expect("backend");

    let listed = backend.list_feature_requests().await.expect("list");

    assert_eq!(listed, features);
    let seen = seen.lock().await;
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/feature-requests");
    assert_eq!(seen[0].auth.as_deref(), Some("Bearer test-key"));
}

#[tokio::test]
async fn omits_authorization_without_api_key() {
    let api = FakeApi::default();
    let seen = Arc::clone(&api.seen);
    let base_url = spawn_fake_api(api).await.expect("spawn api");
    let backend = HttpFeedbackBackend::new(&base_url).expect("backend");

    backend.list_feature_requests().await.expect("list");

    assert_eq!(seen.lock().await[0].auth, None);
}

#[tokio::test]
async fn vote_and_remove_vote_use_post_and_delete() {
    let api = FakeApi::default();
    let seen = Arc::clone(&api.seen);
    let base_url = spawn_fake_api(api).await.expect("spawn api");
    let backend = HttpFeedbackBackend::new(&base_url).expect("backend");
    let id = FeatureRequestId::new_random();

    backend.vote(id).await.expect("vote");
    backend.remove_vote(id).await.expect("remove vote");

    let seen = seen.lock().await;
    let expected_path = format!("/feature-requests/{id}/vote");
    assert_eq!(
        (seen[0].method.as_str(), seen[0].path.as_str()),
        ("POST", expected_path.as_str())
    );
    assert_eq!(
        (seen[1].method.as_str(), seen[1].path.as_str()),
        ("DELETE", expected_path.as_str())
    );
}

#[tokio::test]
async fn create_ticket_omits_missing_email() {
    let api = FakeApi::default();
    let seen = Arc::clone(&api.seen);
    let base_url = spawn_fake_api(api).await.expect("spawn api");
    let backend = HttpFeedbackBackend::new(&base_url).expect("backend");

    let ticket = backend
        .create_ticket("Cannot log in", "The login button does nothing", None)
        .await
        .expect("create ticket");

    assert_eq!(ticket.subject, "Cannot log in");
    let body = seen.lock().await[0].body.clone().expect("json body");
    assert_eq!(body["subject"], "Cannot log in");
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn ticket_detail_decodes_combined_response() {
    let now = Utc::now();
    let ticket = SupportTicket {
        id: TicketId::new_random(),
        subject: "Crash on launch".into(),
        status: TicketStatus::AwaitingReply,
        priority: TicketPriority::Urgent,
        message_count: 1,
        created_at: now,
        updated_at: now,
    };
    let detail = TicketDetail {
        messages: vec![TicketMessage {
            id: TicketMessageId::new_random(),
            ticket_id: ticket.id,
            author_type: AuthorType::Admin,
            body: "Which version are you on?".into(),
            created_at: now,
        }],
        ticket: ticket.clone(),
    };
    let base_url = spawn_fake_api(FakeApi {
        detail: Some(detail.clone()),
        ..FakeApi::default()
    })
    .await
    .expect("spawn api");
    let backend = HttpFeedbackBackend::new(&base_url).expect("backend");

    assert_eq!(backend.get_ticket(ticket.id).await.expect("detail"), detail);
}

#[tokio::test]
async fn api_error_bodies_surface_as_api_errors_in_state() {
    let base_url = spawn_fake_api(FakeApi::default()).await.expect("spawn api");
    let backend = HttpFeedbackBackend::new(&base_url).expect("backend");
    let orchestrator = FeedbackOrchestrator::new(Arc::new(backend));

    orchestrator.fetch_ticket_detail(TicketId::new_random()).await;

    let state = orchestrator.snapshot();
    assert!(!state.is_loading_ticket_detail);
    assert_eq!(
        state.error,
        Some(FeedbackError::Api {
            code: ErrorCode::NotFound,
            message: "ticket not found".into(),
        })
    );
}

#[tokio::test]
async fn plain_error_bodies_include_status() {
    let base_url = spawn_fake_api(FakeApi {
        fail_plain: true,
        ..FakeApi::default()
    })
    .await
    .expect("spawn api");
    let backend = HttpFeedbackBackend::new(&base_url).expect("backend");

    let err = backend.list_tickets().await.expect_err("server error");
    let text = err.to_string();
    assert!(text.contains("500"), "unexpected error: {text}");
    assert!(text.contains("upstream exploded"), "unexpected error: {text}");
}

#[tokio::test]
async fn malformed_success_body_is_not_a_transport_error() {
    let base_url = spawn_fake_api(FakeApi {
        malformed_ok: true,
        ..FakeApi::default()
    })
    .await
    .expect("spawn api");
    let backend = HttpFeedbackBackend::new(&base_url).expect("backend");
    let orchestrator = FeedbackOrchestrator::new(Arc::new(backend));

    orchestrator.fetch_tickets().await;

    let state = orchestrator.snapshot();
    assert!(!state.is_loading_tickets);
    match state.error {
        Some(FeedbackError::Other(message)) => {
            assert!(message.contains("invalid response"), "unexpected error: {message}")
        }
        other => panic!("expected a decode failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let backend = HttpFeedbackBackend::new(&format!("http://{addr}")).expect("backend");
    let orchestrator = FeedbackOrchestrator::new(Arc::new(backend));

    orchestrator.fetch_tickets().await;

    let state = orchestrator.snapshot();
    assert!(!state.is_loading_tickets);
    assert!(matches!(state.error, Some(FeedbackError::Transport(_))));
}

#[test]
fn rejects_non_http_base_urls() {
    assert!(HttpFeedbackBackend::new("ftp://feedback.example.com").is_err());
    assert!(HttpFeedbackBackend::new("feedback.example.com").is_err());
    assert!(HttpFeedbackBackend::new("https://feedback.example.com/api/").is_ok());
}
