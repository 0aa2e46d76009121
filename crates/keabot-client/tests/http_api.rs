use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::StreamExt as _;
use keabot_client::prelude::*;
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Backend {
    stream_bodies: Arc<Mutex<Vec<Value>>>,
    approvals: Arc<Mutex<Vec<(String, String)>>>,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn event_stream(chunks: Vec<&'static [u8]>, hold_open: bool) -> Response {
    let paced = futures::stream::iter(chunks).then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, Infallible>(bytes::Bytes::from_static(chunk))
    });
    let body = if hold_open {
        Body::from_stream(paced.chain(futures::stream::pending()))
    } else {
        Body::from_stream(paced)
    };
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
        .into_response()
}

const TURN: &str = "event: content\ndata: \"Olá \"\n\nevent: tool_start\ndata: {\"name\":\"list_directory\",\"arguments\":{\"path\":\".\"}}\n\nevent: tool_end\ndata: {\"name\":\"list_directory\",\"success\":true,\"result\":\"a.txt\"}\n\nevent: content\ndata: \"🦀\"\n\nevent: done\ndata: {\"visited_files\":[],\"activated_skills\":[],\"tool_calls\":1}\n\nevent: session\ndata: {\"session_id\":\"abc123\"}\n\n";

async fn chat_stream(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    backend.stream_bodies.lock().expect("lock").push(body);
    let bytes = TURN.as_bytes();
    // Split inside "Olá" and inside the crab emoji.
    let a = TURN.find('á').expect("a-acute") + 1;
    let b = TURN.find('🦀').expect("crab") + 2;
    event_stream(vec![&bytes[..a], &bytes[a..b], &bytes[b..]], false)
}

async fn resolve_approval(
    State(backend): State<Backend>,
    Path((id, action)): Path<(String, String)>,
) -> StatusCode {
    backend.approvals.lock().expect("lock").push((id, action));
    StatusCode::OK
}

#[derive(serde::Deserialize)]
struct Limit {
    limit: u32,
}

async fn sessions(Query(query): Query<Limit>) -> Json<Value> {
    Json(json!([{
        "id": "abc123",
        "title": null,
        "created_at": "2025-01-01T00:00:00",
        "updated_at": null,
        "llm_provider": "gemini",
        "tool_call_count": query.limit,
    }]))
}

fn router(backend: Backend) -> Router {
    Router::new()
        .route("/api/chat/stream", post(chat_stream))
        .route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "session_id": body.get("session_id").and_then(Value::as_str).unwrap_or("new-session"),
                    "content": "done",
                    "tool_calls": [],
                    "tool_results": [],
                    "visited_files": ["README.md"],
                }))
            }),
        )
        .route("/api/approval/{id}/{action}", post(resolve_approval))
        .route("/api/sessions", get(sessions))
        .route(
            "/api/health",
            get(|| async { Json(json!({"status": "healthy", "service": "keabot-backend"})) }),
        )
        .route(
            "/api/settings",
            get(|| async {
                Json(json!({
                    "llm_provider": "gemini",
                    "allowed_paths": ["/srv"],
                    "safety_mode": "strict",
                    "available_tools": ["list_directory", "read_file_chunk"],
                }))
            }),
        )
        .with_state(backend)
}

fn client(base_url: &str) -> KeabotClient {
    KeabotClient::new(ClientConfig::new(base_url)).expect("client")
}

#[tokio::test]
async fn streams_turn_split_mid_character() {
    let backend = Backend::default();
    let base = serve(router(backend.clone())).await;
    let client = client(&base);

    let mut stream = client
        .stream_chat(ChatRequest::new("list files").provider("openai"))
        .await
        .expect("start");
    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event);
    }
    let summary = stream.finish().await.expect("finish");

    assert_eq!(events.len(), 6);
    assert_eq!(events[0], AgentEvent::ContentDelta { text: "Olá ".into() });
    assert!(matches!(&events[1], AgentEvent::ToolStarted { name, .. } if name == "list_directory"));
    assert!(matches!(&events[2], AgentEvent::ToolEnded { success: true, .. }));
    assert_eq!(events[3], AgentEvent::ContentDelta { text: "🦀".into() });
    assert!(matches!(&events[4], AgentEvent::StreamCompleted { tool_call_count: 1, .. }));
    assert_eq!(summary.session_id(), Some("abc123"));
    assert_eq!(summary.error, None);

    let bodies = backend.stream_bodies.lock().expect("lock");
    assert_eq!(
        bodies[0],
        json!({"message": "list files", "llm_provider": "openai", "stream": true})
    );
}

#[tokio::test]
async fn server_error_status_yields_single_stream_error() {
    let router = Router::new().route(
        "/api/chat/stream",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = serve(router).await;

    let mut stream = client(&base)
        .stream_chat(ChatRequest::new("hi"))
        .await
        .expect("start");
    let first = stream.next_event().await;
    assert_eq!(
        first,
        Some(AgentEvent::StreamError {
            message: "HTTP error 500: Internal Server Error".into()
        })
    );
    assert_eq!(stream.next_event().await, None);
    let summary = stream.finish().await.expect("finish");
    assert_eq!(summary.events_dispatched, 1);
    assert_eq!(summary.frames_decoded, 0);
}

#[tokio::test]
async fn unreachable_backend_yields_stream_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut stream = client(&format!("http://{addr}"))
        .stream_chat(ChatRequest::new("hi"))
        .await
        .expect("start");
    let event = stream.next_event().await.expect("error event");
    assert!(matches!(event, AgentEvent::StreamError { message } if message.starts_with("connection failed")));
    assert_eq!(stream.next_event().await, None);
}

#[tokio::test]
async fn abort_during_silent_stream_stops_callbacks() {
    let router = Router::new().route(
        "/api/chat/stream",
        post(|| async {
            event_stream(
                vec![&b"event: tool_start\ndata: {\"name\":\"slow_tool\",\"arguments\":{}}\n\n"[..]],
                true,
            )
        }),
    );
    let base = serve(router).await;

    let mut stream = client(&base)
        .stream_chat(ChatRequest::new("hi"))
        .await
        .expect("start");
    let first = stream.next_event().await.expect("tool start");
    assert!(matches!(first, AgentEvent::ToolStarted { .. }));

    let abort = stream.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        abort.abort();
    });
    assert_eq!(stream.next_event().await, None);
    assert!(matches!(stream.finish().await, Err(ClientError::Cancelled)));
}

#[tokio::test]
async fn slow_stream_outlives_request_timeout() {
    let router = Router::new().route(
        "/api/chat/stream",
        post(|| async {
            let late = futures::stream::once(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, Infallible>(bytes::Bytes::from_static(
                    b"event: content\ndata: \"after a long tool call\"\n\n",
                ))
            });
            (
                [(header::CONTENT_TYPE, "text/event-stream")],
                Body::from_stream(late),
            )
                .into_response()
        }),
    );
    let base = serve(router).await;
    let config = ClientConfig::new(base).request_timeout(Duration::from_millis(50));
    let client = KeabotClient::new(config).expect("client");

    let mut stream = client
        .stream_chat(ChatRequest::new("hi"))
        .await
        .expect("start");
    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![AgentEvent::ContentDelta {
            text: "after a long tool call".into()
        }]
    );
    let summary = stream.finish().await.expect("finish");
    assert_eq!(summary.error, None);
}

#[tokio::test]
async fn approval_round_trip_posts_once_and_leaves_decoder_alone() {
    let backend = Backend::default();
    let base = serve(router(backend.clone())).await;
    let client = client(&base);

    let mut decoder = keabot_client::StreamDecoder::new();
    let decoded = decoder.push_chunk(
        b"event: approval_required\ndata: {\"approval_id\":\"a1\",\"tool_name\":\"delete_file\",\"arguments\":{\"path\":\"temp.log\"}}\n\nevent: con",
    );
    let approval_id = match &decoded[0].event {
        AgentEvent::ApprovalRequired {
            approval_id,
            tool_name,
            arguments,
        } => {
            assert_eq!(tool_name, "delete_file");
            assert_eq!(arguments.get("path"), Some(&json!("temp.log")));
            approval_id.clone()
        }
        other => panic!("unexpected event {other:?}"),
    };
    let frames_before = decoder.frames_decoded();
    let buffered_before = decoder.frame_decoder().buffered().to_string();

    client.approvals().approve(&approval_id).await.expect("approve");

    assert_eq!(
        *backend.approvals.lock().expect("lock"),
        vec![("a1".to_string(), "approve".to_string())]
    );
    assert_eq!(decoder.frames_decoded(), frames_before);
    assert_eq!(decoder.frame_decoder().buffered(), buffered_before);

    let rest = decoder.push_chunk(b"tent\ndata: \"deleted\"\n\n");
    assert_eq!(rest[0].event, AgentEvent::ContentDelta { text: "deleted".into() });
}

#[tokio::test]
async fn reject_and_spawned_resolution_hit_reject_endpoint() {
    let backend = Backend::default();
    let base = serve(router(backend.clone())).await;
    let approvals = client(&base).approvals();

    approvals.reject("a2").await.expect("reject");
    approvals
        .spawn_resolve("a3", keabot_client::ApprovalDecision::Reject)
        .await
        .expect("join")
        .expect("reject");

    assert_eq!(
        *backend.approvals.lock().expect("lock"),
        vec![
            ("a2".to_string(), "reject".to_string()),
            ("a3".to_string(), "reject".to_string()),
        ]
    );
}

#[tokio::test]
async fn approval_on_unknown_route_reports_status() {
    let base = serve(Router::new()).await;
    let err = client(&base)
        .approvals()
        .approve("a1")
        .await
        .expect_err("404");
    assert!(matches!(err, ClientError::Status { status: 404, .. }));
}

#[tokio::test]
async fn non_streaming_turn_and_conversation() {
    let base = serve(router(Backend::default())).await;
    let mut conversation = Conversation::new(client(&base));

    let reply = conversation.send("hello").await.expect("chat");
    assert_eq!(reply.session_id, "new-session");
    assert_eq!(reply.visited_files, vec!["README.md"]);
    assert_eq!(conversation.session_id(), Some("new-session"));

    let reply = conversation.send("again").await.expect("chat");
    assert_eq!(reply.session_id, "new-session");
}

#[tokio::test]
async fn side_endpoints_decode() {
    let base = serve(router(Backend::default())).await;
    let client = client(&base);

    let sessions = client.sessions(7).await.expect("sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "abc123");
    assert_eq!(sessions[0].tool_call_count, 7);

    let health = client.health().await.expect("health");
    assert_eq!(health.status, "healthy");

    let settings = client.settings().await.expect("settings");
    assert_eq!(settings.safety_mode, "strict");
    assert_eq!(settings.available_tools.len(), 2);

    let err = client.session("missing").await.expect_err("404");
    assert!(matches!(err, ClientError::Status { status: 404, .. }));
}
