//! End-to-end engine scenarios: offline mutations degrading to queued local
//! applies, reconciliation on reconnect, and session teardown.

mod common;

use common::{eventually, widget};
use shelfsync::client::api::ProductApi;
use shelfsync::client::config::Config;
use shelfsync::client::queue::{OperationKind, PendingQueue};
use shelfsync::client::realtime::ChannelFactory;
use shelfsync::client::service::ProductService;
use shelfsync::client::session::{ConnectivitySignal, SessionSignal};
use shelfsync::shared::error::SyncError;
use std::net::TcpListener;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    service: ProductService,
    session: SessionSignal,
    connectivity: ConnectivitySignal,
    queue: PendingQueue,
}

/// Build a service against `base`, starting offline with no session.
async fn harness(base: &str) -> Harness {
    let config = Config::with_server_url(base)
        .unwrap()
        .request_timeout(Duration::from_millis(500))
        .connect_timeout(Duration::from_millis(500))
        .backoff(Duration::from_millis(1), Duration::from_millis(20))
        .max_attempts(5);
    let session = SessionSignal::new();
    let connectivity = ConnectivitySignal::new(false);
    let queue = PendingQueue::in_memory().await.unwrap();
    let service = ProductService::new(
        &config,
        ProductApi::new(&config),
        queue.clone(),
        ChannelFactory::new(&config),
        session.subscribe(),
        connectivity.subscribe(),
    );
    Harness {
        service,
        session,
        connectivity,
        queue,
    }
}

/// Reserve a port that refuses connections until it is bound again.
fn reserved_port() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

#[tokio::test]
async fn offline_create_is_reconciled_on_reconnect() {
    let addr = reserved_port();
    let h = harness(&format!("http://{}", addr)).await;
    h.service.start().await;
    h.session.set_token("t-1");

    // Create while the backend is unreachable.
    let local = h.service.add_product(widget()).await.unwrap();
    let placeholder = local.id.clone().unwrap();

    let state = h.service.snapshot().await;
    assert_eq!(state.products.len(), 1);
    assert!(state.find(&placeholder).is_some(), "optimistic apply under client id");

    let entries = h.queue.list(OperationKind::Create, "t-1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].key.starts_with("pending-create-"));

    // Bring the backend up on the reserved port, then flip connectivity.
    let listener = TcpListener::bind(addr).unwrap();
    listener.set_nonblocking(true).unwrap();
    let server = MockServer::builder().listener(listener).start().await;
    let mut created = widget();
    created.id = Some("srv-1".to_string());
    Mock::given(method("POST"))
        .and(path("/api/product"))
        .respond_with(ResponseTemplate::new(201).set_body_json(&created))
        .mount(&server)
        .await;

    h.connectivity.set_online(true);

    assert!(
        eventually(|| async { h.queue.count().await.unwrap() == 0 }).await,
        "queue drained after reconnect"
    );
    assert!(
        eventually(|| async {
            let state = h.service.snapshot().await;
            state.find("srv-1").is_some() && state.find(&placeholder).is_none()
        })
        .await,
        "placeholder id replaced by server-assigned id"
    );
}

#[tokio::test]
async fn offline_update_survives_restart_and_reconciles() {
    let addr = reserved_port();
    let base = format!("http://{}", addr);

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("pending.db");

    // First process lifetime: fail an update offline.
    {
        let config = Config::with_server_url(&base)
            .unwrap()
            .request_timeout(Duration::from_millis(500))
            .backoff(Duration::from_millis(1), Duration::from_millis(20));
        let session = SessionSignal::new();
        let connectivity = ConnectivitySignal::new(false);
        let service = ProductService::new(
            &config,
            ProductApi::new(&config),
            PendingQueue::open(&db).await.unwrap(),
            ChannelFactory::new(&config),
            session.subscribe(),
            connectivity.subscribe(),
        );
        session.set_token("t-1");
        let mut product = widget();
        product.id = Some("7".to_string());
        product.name = "Widget v2".to_string();
        service.update_product(product).await.unwrap();
    }

    // Second lifetime: the entry is still there and replays.
    let listener = TcpListener::bind(addr).unwrap();
    listener.set_nonblocking(true).unwrap();
    let server = MockServer::builder().listener(listener).start().await;
    let mut updated = widget();
    updated.id = Some("7".to_string());
    updated.name = "Widget v2".to_string();
    Mock::given(method("PUT"))
        .and(path("/api/product/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&updated))
        .mount(&server)
        .await;

    let config = Config::with_server_url(&base)
        .unwrap()
        .request_timeout(Duration::from_millis(500))
        .backoff(Duration::from_millis(1), Duration::from_millis(20));
    let session = SessionSignal::new();
    let connectivity = ConnectivitySignal::new(true);
    let queue = PendingQueue::open(&db).await.unwrap();
    let service = ProductService::new(
        &config,
        ProductApi::new(&config),
        queue.clone(),
        ChannelFactory::new(&config),
        session.subscribe(),
        connectivity.subscribe(),
    );
    assert_eq!(queue.count().await.unwrap(), 1, "entry survived the restart");

    session.set_token("t-1");
    let summary = service.reconcile().await.unwrap();
    assert_eq!(summary.replayed, 1);
    assert_eq!(queue.count().await.unwrap(), 0);
    assert_eq!(service.snapshot().await.products[0].name, "Widget v2");
}

#[tokio::test]
async fn unauthorized_mutation_leaves_no_trace() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/product"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let h = harness(&server.uri()).await;
    h.session.set_token("stale-token");

    let err = h.service.add_product(widget()).await.unwrap_err();
    assert!(matches!(err, SyncError::Auth { .. }));
    assert!(h.service.snapshot().await.products.is_empty());
    assert_eq!(h.queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn two_offline_edits_produce_one_entry() {
    let h = harness("http://127.0.0.1:1").await;
    h.session.set_token("t-1");

    let mut product = widget();
    product.id = Some("7".to_string());
    h.service.update_product(product.clone()).await.unwrap();
    product.name = "Widget v3".to_string();
    h.service.update_product(product).await.unwrap();

    let entries = h.queue.list(OperationKind::Update, "t-1").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].product.name, "Widget v3");
}

#[tokio::test]
async fn logout_clears_session_state_and_queue() {
    let h = harness("http://127.0.0.1:1").await;
    h.service.start().await;
    h.session.set_token("t-1");

    h.service.add_product(widget()).await.unwrap();
    assert!(
        eventually(|| async { h.queue.count().await.unwrap() == 1 }).await,
        "offline create queued"
    );

    h.session.clear();

    assert!(
        eventually(|| async {
            h.queue.count().await.unwrap() == 0
                && h.service.snapshot().await.products.is_empty()
        })
        .await,
        "teardown cleared the session's entries and reset the store"
    );
}

#[tokio::test]
async fn another_sessions_entries_are_not_replayed() {
    let addr = reserved_port();
    let h = harness(&format!("http://{}", addr)).await;
    h.session.set_token("alice");

    let mut product = widget();
    product.id = Some("7".to_string());
    h.service.update_product(product).await.unwrap();
    assert_eq!(h.queue.count().await.unwrap(), 1);

    // A different user logs in; the backend comes up.
    let listener = TcpListener::bind(addr).unwrap();
    listener.set_nonblocking(true).unwrap();
    let _server = MockServer::builder().listener(listener).start().await;
    h.session.set_token("bob");

    let summary = h.service.reconcile().await.unwrap();
    assert_eq!(summary.replayed, 0);
    assert_eq!(
        h.queue.count().await.unwrap(),
        1,
        "alice's entry is skipped, not replayed under bob's session"
    );
}
