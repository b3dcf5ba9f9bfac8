//! Relay endpoint — POST on any path.
//!
//! Request:  `{"target": "user", "userId": 123, "message": "hi"}` or with an
//!           `"embed": {...}` object (the embed wins when both are present).
//! Response: `{"message": "..."}` with 200 / 400 / 404 / 405 / 500 / 503.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    response::Response,
};
use tracing::{debug, info, warn};

use courier_core::types::{Delivery, MessageRequest};

use crate::app::AppState;
use crate::error::RelayError;
use crate::http::reply::{reply, SENT};

/// Fallback handler for every path and method.
pub async fn relay_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match relay(&state, req).await {
        Ok(()) => reply(StatusCode::OK, SENT),
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                warn!(%method, %path, status = status.as_u16(), error = %e, "relay failed");
            } else {
                debug!(%method, %path, status = status.as_u16(), error = %e, "relay rejected");
            }
            axum::response::IntoResponse::into_response(e)
        }
    }
}

async fn relay(state: &AppState, req: Request) -> Result<(), RelayError> {
    // ── Gate ──────────────────────────────────────────────────────────────────
    if !state.messenger.is_ready() {
        return Err(RelayError::NotReady);
    }
    if req.method() != Method::POST {
        return Err(RelayError::MethodNotAllowed);
    }

    // ── Parse ─────────────────────────────────────────────────────────────────
    let body = axum::body::to_bytes(req.into_body(), state.config.gateway.max_body_bytes)
        .await
        .map_err(|e| {
            debug!(error = %e, "failed to read request body");
            RelayError::InvalidFormat
        })?;

    let msg = MessageRequest::from_json(&body, state.config.relay.case_insensitive_keys)
        .map_err(|e| {
            debug!(error = %e, bytes = body.len(), "invalid relay payload");
            RelayError::InvalidFormat
        })?;

    msg.check_target().map_err(RelayError::UnsupportedTarget)?;

    // ── Resolve ───────────────────────────────────────────────────────────────
    let recipient = state
        .messenger
        .find_user(msg.user_id)
        .await?
        .ok_or(RelayError::UserNotFound)?;

    // ── Send ──────────────────────────────────────────────────────────────────
    match msg.delivery() {
        Delivery::Embed(embed) => {
            state.messenger.send_embed(&recipient, embed).await?;
            info!(user_id = recipient.id, user = %recipient.name, "embed relayed");
        }
        Delivery::Text(text) => {
            state.messenger.send_text(&recipient, text).await?;
            info!(user_id = recipient.id, user = %recipient.name, chars = text.chars().count(), "message relayed");
        }
        Delivery::Nothing if state.config.relay.reject_empty => {
            return Err(RelayError::MissingContent);
        }
        Delivery::Nothing => {
            info!(user_id = recipient.id, "request carried no message or embed, nothing sent");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use courier_core::config::CourierConfig;
    use courier_core::types::EmbedRequest;
    use courier_core::{CourierError, DirectMessenger, Recipient};

    use super::*;
    use crate::app::build_router;
    use crate::http::reply::StatusReply;

    const KNOWN_USER: u64 = 1_234_567_890_123_456_789;
    const BROKEN_USER: u64 = 666;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(u64, String),
        Embed(u64, EmbedRequest),
    }

    /// In-memory messenger: knows a fixed set of users and records sends.
    struct FakeMessenger {
        ready: AtomicBool,
        users: HashSet<u64>,
        sent: Mutex<Vec<Sent>>,
    }

    impl FakeMessenger {
        fn new(ready: bool) -> Arc<Self> {
            Arc::new(Self {
                ready: AtomicBool::new(ready),
                users: [KNOWN_USER, BROKEN_USER].into_iter().collect(),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DirectMessenger for FakeMessenger {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn find_user(&self, user_id: u64) -> courier_core::Result<Option<Recipient>> {
            Ok(self.users.contains(&user_id).then(|| Recipient {
                id: user_id,
                name: format!("user{user_id}"),
            }))
        }

        async fn send_text(&self, to: &Recipient, content: &str) -> courier_core::Result<()> {
            if to.id == BROKEN_USER {
                return Err(CourierError::Platform(
                    "Cannot send messages to this user".to_string(),
                ));
            }
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Text(to.id, content.to_string()));
            Ok(())
        }

        async fn send_embed(&self, to: &Recipient, embed: &EmbedRequest) -> courier_core::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Embed(to.id, embed.clone()));
            Ok(())
        }
    }

    fn state_with(messenger: Arc<FakeMessenger>, config: CourierConfig) -> Arc<AppState> {
        Arc::new(AppState::new(config, messenger))
    }

    async fn call(state: Arc<AppState>, method: Method, body: impl Into<Body>) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri("/anything/at/all")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let resp = build_router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let reply: StatusReply = serde_json::from_slice(&bytes).unwrap();
        (status, reply.message)
    }

    async fn post(messenger: &Arc<FakeMessenger>, body: serde_json::Value) -> (StatusCode, String) {
        let state = state_with(Arc::clone(messenger), CourierConfig::default());
        call(state, Method::POST, body.to_string()).await
    }

    #[tokio::test]
    async fn plain_message_is_sent_once() {
        let m = FakeMessenger::new(true);
        let (status, msg) = post(
            &m,
            json!({"target": "user", "userId": KNOWN_USER, "message": "hello there"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(msg, "Message sent successfully");
        assert_eq!(m.sent(), vec![Sent::Text(KNOWN_USER, "hello there".to_string())]);
    }

    #[tokio::test]
    async fn not_ready_is_503_regardless_of_body_or_method() {
        let m = FakeMessenger::new(false);
        let state = state_with(Arc::clone(&m), CourierConfig::default());

        for (method, body) in [
            (Method::POST, json!({"target": "user", "userId": KNOWN_USER, "message": "x"}).to_string()),
            (Method::POST, "garbage".to_string()),
            (Method::GET, String::new()),
        ] {
            let (status, msg) = call(Arc::clone(&state), method, body).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(msg, "Discord client is not ready");
        }
        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn readiness_loss_is_observed_per_request() {
        let m = FakeMessenger::new(true);
        let body = json!({"target": "user", "userId": KNOWN_USER, "message": "x"});
        assert_eq!(post(&m, body.clone()).await.0, StatusCode::OK);

        m.ready.store(false, Ordering::SeqCst);
        assert_eq!(post(&m, body).await.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(m.sent().len(), 1);
    }

    #[tokio::test]
    async fn non_post_methods_are_405() {
        let m = FakeMessenger::new(true);
        let state = state_with(Arc::clone(&m), CourierConfig::default());
        let body = json!({"target": "user", "userId": KNOWN_USER, "message": "x"}).to_string();

        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH, Method::GET] {
            let (status, msg) = call(Arc::clone(&state), method, body.clone()).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(msg, "Method not allowed");
        }
        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_bodies_are_400() {
        let m = FakeMessenger::new(true);
        for body in [
            "{not json".to_string(),
            "null".to_string(),
            String::new(),
            json!({"target": "user", "userId": "abc", "message": "x"}).to_string(),
            json!({"target": "user", "message": "x"}).to_string(),
        ] {
            let state = state_with(Arc::clone(&m), CourierConfig::default());
            let (status, msg) = call(state, Method::POST, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(msg, "Invalid request format");
        }
        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_400() {
        let m = FakeMessenger::new(true);
        let mut config = CourierConfig::default();
        config.gateway.max_body_bytes = 16;
        let body = json!({"target": "user", "userId": KNOWN_USER, "message": "far too long for the cap"});
        let (status, _) = call(state_with(Arc::clone(&m), config), Method::POST, body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn unsupported_target_quotes_received_value() {
        let m = FakeMessenger::new(true);

        let (status, msg) = post(&m, json!({"target": "channel", "userId": KNOWN_USER, "message": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("'channel'"), "{msg}");

        let (status, msg) = post(&m, json!({"target": "", "userId": KNOWN_USER, "message": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Unsupported target: ''");

        let (status, msg) = post(&m, json!({"userId": KNOWN_USER, "message": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Unsupported target: ''");

        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn target_and_keys_are_case_insensitive() {
        let m = FakeMessenger::new(true);
        let (status, _) = post(&m, json!({"Target": "USER", "USERID": KNOWN_USER, "Message": "hi"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(m.sent(), vec![Sent::Text(KNOWN_USER, "hi".to_string())]);
    }

    #[tokio::test]
    async fn unknown_user_is_404_whatever_the_content() {
        let m = FakeMessenger::new(true);
        for body in [
            json!({"target": "user", "userId": 42, "message": "x"}),
            json!({"target": "user", "userId": 42, "embed": {"title": "t"}}),
            json!({"target": "user", "userId": 42}),
        ] {
            let (status, msg) = post(&m, body).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(msg, "User not found");
        }
        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn embed_wins_over_message_and_keeps_field_order() {
        let m = FakeMessenger::new(true);
        let body = json!({
            "target": "user",
            "userId": KNOWN_USER,
            "message": "ignored",
            "embed": {
                "title": "Status",
                "color": 3447003,
                "timestamp": "not-a-date",
                "fields": [
                    {"name": "A", "value": "1", "inline": true},
                    {"name": "B", "value": "2"},
                    {"name": "C", "value": "3", "inline": true}
                ]
            }
        });
        let (status, _) = post(&m, body).await;
        assert_eq!(status, StatusCode::OK);

        let sent = m.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Embed(to, embed) = &sent[0] else {
            panic!("expected an embed, got {sent:?}");
        };
        assert_eq!(*to, KNOWN_USER);
        assert_eq!(embed.title.as_deref(), Some("Status"));
        assert_eq!(embed.timestamp.as_deref(), Some("not-a-date"));
        let fields = embed.fields.as_ref().unwrap();
        let order: Vec<(&str, bool)> = fields.iter().map(|f| (f.name.as_str(), f.inline)).collect();
        assert_eq!(order, [("A", true), ("B", false), ("C", true)]);
    }

    #[tokio::test]
    async fn empty_request_is_400_by_default() {
        let m = FakeMessenger::new(true);
        let (status, msg) = post(&m, json!({"target": "user", "userId": KNOWN_USER, "message": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Either message or embed is required");
        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn empty_request_is_acknowledged_when_allowed() {
        let m = FakeMessenger::new(true);
        let mut config = CourierConfig::default();
        config.relay.reject_empty = false;
        let body = json!({"target": "user", "userId": KNOWN_USER});
        let (status, msg) = call(state_with(Arc::clone(&m), config), Method::POST, body.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(msg, "Message sent successfully");
        assert!(m.sent().is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_500_with_platform_text() {
        let m = FakeMessenger::new(true);
        let (status, msg) = post(&m, json!({"target": "user", "userId": BROKEN_USER, "message": "x"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "Cannot send messages to this user");
    }

    /// Messenger whose sends park until released, one release per send.
    #[derive(Default)]
    struct GatedMessenger {
        in_send: AtomicUsize,
        entered: Notify,
        release: Notify,
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl DirectMessenger for GatedMessenger {
        fn is_ready(&self) -> bool {
            true
        }

        async fn find_user(&self, user_id: u64) -> courier_core::Result<Option<Recipient>> {
            Ok(Some(Recipient {
                id: user_id,
                name: "gated".to_string(),
            }))
        }

        async fn send_text(&self, _to: &Recipient, _content: &str) -> courier_core::Result<()> {
            self.in_send.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.in_send.fetch_sub(1, Ordering::SeqCst);
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_embed(&self, to: &Recipient, _embed: &EmbedRequest) -> courier_core::Result<()> {
            self.send_text(to, "").await
        }
    }

    fn post_request(text: &str) -> Request<Body> {
        let body = json!({"target": "user", "userId": KNOWN_USER, "message": text});
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn concurrency_cap_holds_back_overlapping_requests() {
        let gate = Arc::new(GatedMessenger::default());
        let mut config = CourierConfig::default();
        config.gateway.max_in_flight = 1;
        let app = build_router(Arc::new(AppState::new(config, gate.clone())));

        let first = tokio::spawn(app.clone().oneshot(post_request("first")));
        gate.entered.notified().await;

        let mut second = tokio::spawn(app.clone().oneshot(post_request("second")));
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut second)
                .await
                .is_err(),
            "second request finished while the first held the only slot"
        );
        assert_eq!(gate.in_send.load(Ordering::SeqCst), 1);

        gate.release.notify_one();
        let resp = first.await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        gate.entered.notified().await;
        gate.release.notify_one();
        let resp = second.await.unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(gate.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn without_cap_requests_overlap() {
        let gate = Arc::new(GatedMessenger::default());
        let app = build_router(Arc::new(AppState::new(CourierConfig::default(), gate.clone())));

        let first = tokio::spawn(app.clone().oneshot(post_request("first")));
        let second = tokio::spawn(app.clone().oneshot(post_request("second")));
        gate.entered.notified().await;
        gate.entered.notified().await;
        assert_eq!(gate.in_send.load(Ordering::SeqCst), 2);

        gate.release.notify_one();
        gate.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap().status(), StatusCode::OK);
        assert_eq!(second.await.unwrap().unwrap().status(), StatusCode::OK);
    }
}
