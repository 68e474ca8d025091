/// End-to-end loopback test: a real server on 127.0.0.1, two live push
/// subscriptions for the recipient, a send from another account, and the
/// pull endpoints: exercising registration, fan-out, deduplication and
/// seen-marking through actual HTTP.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    middleware,
    routing::{get, post},
};
use futures_util::StreamExt;
use uuid::Uuid;

use ripple_api::auth::{self, AppState, AppStateInner};
use ripple_api::messages;
use ripple_api::middleware::require_auth;
use ripple_api::stream;
use ripple_client::api::{ApiClient, StaticToken};
use ripple_relay::{Publisher, Registry};
use ripple_types::api::{RegisterRequest, RegisterResponse, SendMessageRequest};
use ripple_types::events::PushEvent;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_server() -> SocketAddr {
    let db = Arc::new(ripple_db::Database::open_in_memory().unwrap());
    let registry = Registry::new();
    let publisher = Publisher::new(db.clone(), registry.clone());
    let state: AppState = Arc::new(AppStateInner {
        db,
        registry,
        publisher,
        jwt_secret: "dev-secret-change-me".into(),
    });

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/api/messages/stream/{user_id}", get(stream::subscribe))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/messages/send", post(messages::send_message))
        .route("/api/messages/history", post(messages::get_history))
        .route("/api/messages/recent", get(messages::recent_messages))
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    let app = Router::new().merge(public_routes).merge(protected_routes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn register(http: &reqwest::Client, base: &str, username: &str) -> (Uuid, String) {
    let resp: RegisterResponse = http
        .post(format!("{base}/auth/register"))
        .json(&RegisterRequest {
            username: username.into(),
            password: "correct horse".into(),
        })
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    (resp.user_id, resp.token)
}

async fn next_event(
    stream: &mut (impl futures_util::Stream<Item = Result<PushEvent, ripple_client::ClientError>>
          + Unpin),
) -> PushEvent {
    tokio::time::timeout(RECV_TIMEOUT, stream.next())
        .await
        .expect("timed out waiting for push event")
        .expect("push stream ended")
        .expect("push stream errored")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn send_fans_out_to_every_device_and_pull_dedupes() {
    let addr = spawn_server().await;
    let base = format!("http://{addr}");
    let http = reqwest::Client::new();

    let (_ana_id, ana_token) = register(&http, &base, "ana").await;
    let (bo_id, bo_token) = register(&http, &base, "bo").await;

    // Bo opens two devices; both get the subscription ack first
    let mut device1 = Box::pin(ripple_client::stream::subscribe(
        http.clone(),
        base.clone(),
        bo_id,
    ));
    let mut device2 = Box::pin(ripple_client::stream::subscribe(
        http.clone(),
        base.clone(),
        bo_id,
    ));
    assert_eq!(next_event(&mut device1).await, PushEvent::Connected { user_id: bo_id });
    assert_eq!(next_event(&mut device2).await, PushEvent::Connected { user_id: bo_id });

    // Ana sends one message
    let ana_api = ApiClient::new(http.clone(), base.as_str(), StaticToken(ana_token));
    let sent = ana_api
        .send(&SendMessageRequest {
            to_user_id: bo_id,
            text: Some("hi".into()),
            media_url: None,
        })
        .await
        .unwrap();

    // Both devices receive an event carrying the same message identity
    for device in [&mut device1, &mut device2] {
        match next_event(device).await {
            PushEvent::Message(envelope) => {
                assert_eq!(envelope.id, sent.id);
                assert_eq!(envelope.from.username, "ana");
            }
            other => panic!("expected message event, got {other:?}"),
        }
    }

    // Pulling the conversation returns exactly one message with that id...
    let bo_api = ApiClient::new(http.clone(), base.as_str(), StaticToken(bo_token));
    let history = bo_api.history(sent.from_user_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, sent.id);
    // ...still showing the pre-pull seen state
    assert!(!history[0].seen);

    // The pull flipped it; a second pull observes seen = true and nothing
    // ever flips back
    let again = bo_api.history(sent.from_user_id).await.unwrap();
    assert_eq!(again.len(), 1);
    assert!(again[0].seen);

    // The overview pull sees one denormalized message involving bo
    let recent = bo_api.recent().await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, sent.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_device_is_dropped_from_fanout() {
    let addr = spawn_server().await;
    let base = format!("http://{addr}");
    let http = reqwest::Client::new();

    let (_ana_id, ana_token) = register(&http, &base, "ana").await;
    let (bo_id, _bo_token) = register(&http, &base, "bo").await;

    let mut device1 = Box::pin(ripple_client::stream::subscribe(
        http.clone(),
        base.clone(),
        bo_id,
    ));
    let device2 = Box::pin(ripple_client::stream::subscribe(
        http.clone(),
        base.clone(),
        bo_id,
    ));
    assert_eq!(next_event(&mut device1).await, PushEvent::Connected { user_id: bo_id });

    // Device 2 disconnects before anything is sent
    drop(device2);
    // Give the server a moment to observe the closed transport
    tokio::time::sleep(Duration::from_millis(200)).await;

    let ana_api = ApiClient::new(http.clone(), base.as_str(), StaticToken(ana_token));
    let sent = ana_api
        .send(&SendMessageRequest {
            to_user_id: bo_id,
            text: Some("still there?".into()),
            media_url: None,
        })
        .await
        .unwrap();

    // The surviving device still gets the event
    match next_event(&mut device1).await {
        PushEvent::Message(envelope) => assert_eq!(envelope.id, sent.id),
        other => panic!("expected message event, got {other:?}"),
    }
}
