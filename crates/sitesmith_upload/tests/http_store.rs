use std::{collections::HashSet, future::IntoFuture, net::SocketAddr, sync::Arc, time::Duration};

use assert_matches::assert_matches;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{head, post},
    Router,
};
use parking_lot::Mutex;
use sitesmith_cas::{address, Cid, Codec};
use sitesmith_networking::retry_policies::{DoNotRetryPolicy, ExponentialBackoff};
use sitesmith_upload::{
    BlockStore, DeduplicatingUploader, HttpBlockStore, ProbeError, PutOutcome, StoreError,
    UploadError,
};
use tokio::sync::oneshot;
use url::Url;

#[derive(Default)]
struct StoreState {
    stored: Mutex<HashSet<String>>,
    probes: Mutex<usize>,
    writes: Mutex<Vec<Option<String>>>,
    probe_delay: Mutex<Option<Duration>>,
    probe_status: Mutex<Option<StatusCode>>,
    rejection: Mutex<Option<String>>,
}

async fn probe(State(state): State<Arc<StoreState>>, Path(cid): Path<String>) -> StatusCode {
    *state.probes.lock() += 1;
    let delay = *state.probe_delay.lock();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = *state.probe_status.lock() {
        return status;
    }
    if state.stored.lock().contains(&cid) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn fs_store(
    State(state): State<Arc<StoreState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.writes.lock().push(content_type);

    if let Some(message) = state.rejection.lock().clone() {
        return (StatusCode::INTERNAL_SERVER_ERROR, message);
    }

    // The store does not know the codec of the block, so it serves the bytes under both.
    let mut stored = state.stored.lock();
    stored.insert(Cid::for_block(Codec::Raw, &body).to_string());
    stored.insert(Cid::for_block(Codec::DagPb, &body).to_string());
    (StatusCode::OK, String::new())
}

struct StoreServer {
    shutdown_sender: Option<oneshot::Sender<()>>,
    local_address: SocketAddr,
    state: Arc<StoreState>,
}

impl StoreServer {
    async fn spawn() -> Self {
        let state = Arc::new(StoreState::default());
        let app = Router::new()
            .route("/ipfs/{cid}", head(probe))
            .route("/web4/contract/web4gpt.near/fs_store", post(fs_store))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_address = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .into_future();
        tokio::spawn(server);

        Self {
            shutdown_sender: Some(tx),
            local_address,
            state,
        }
    }

    fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.local_address, path)).unwrap()
    }

    fn block_store(&self) -> HttpBlockStore {
        let client = sitesmith_networking::client_with_middleware(
            reqwest::Client::new(),
            None::<DoNotRetryPolicy>,
            None,
        );
        HttpBlockStore::new(
            client,
            self.url("/"),
            self.url("/web4/contract/web4gpt.near/fs_store"),
        )
    }

    fn write_count(&self) -> usize {
        self.state.writes.lock().len()
    }
}

impl Drop for StoreServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_sender.take() {
            let _ = tx.send(());
        }
    }
}

fn site() -> Vec<sitesmith_cas::Block> {
    address([
        ("index.html", "<html></html>\n"),
        ("style.css", "body{}\n"),
        ("css/print.css", "body{color:black}\n"),
    ])
    .unwrap()
    .into_blocks()
}

#[tokio::test]
async fn test_publishing_twice_writes_once() {
    let server = StoreServer::spawn().await;
    let uploader = DeduplicatingUploader::new(Arc::new(server.block_store()))
        .with_probe_throttle(Duration::from_millis(1));
    let blocks = site();

    let first = uploader.upload(&blocks).await.unwrap();
    assert_eq!(first.written, blocks.len());
    assert_eq!(server.write_count(), blocks.len());
    assert!(server
        .state
        .writes
        .lock()
        .iter()
        .all(|content_type| content_type.as_deref() == Some("application/octet-stream")));

    let second = uploader.upload(&blocks).await.unwrap();
    assert_eq!(second.present, blocks.len());
    assert_eq!(second.written, 0);
    assert_eq!(server.write_count(), blocks.len());
    assert_eq!(*server.state.probes.lock(), 2 * blocks.len());
}

#[tokio::test]
async fn test_whitelisted_rejection_is_already_applied() {
    let server = StoreServer::spawn().await;
    *server.state.rejection.lock() =
        Some("Server error: Cannot find contract code for account web4gpt.near".to_string());

    let blocks = site();
    assert_eq!(
        server.block_store().put(&blocks[0]).await.unwrap(),
        PutOutcome::AlreadyApplied
    );
}

#[tokio::test]
async fn test_unknown_rejection_is_fatal() {
    let server = StoreServer::spawn().await;
    *server.state.rejection.lock() = Some("Exceeded the prepaid gas.".to_string());

    let uploader = DeduplicatingUploader::new(Arc::new(server.block_store()))
        .with_probe_throttle(Duration::ZERO);
    let err = uploader.upload(&site()).await.unwrap_err();
    assert_matches!(
        err,
        UploadError::Store(StoreError::Rejected { status: StatusCode::INTERNAL_SERVER_ERROR, ref message, .. })
            if message == "Exceeded the prepaid gas."
    );
    assert_eq!(server.write_count(), 1);
}

#[tokio::test]
async fn test_probe_timeouts_are_retried_then_fatal() {
    let server = StoreServer::spawn().await;
    *server.state.probe_delay.lock() = Some(Duration::from_millis(500));

    let store = server
        .block_store()
        .with_probe_timeout(Duration::from_millis(20))
        .with_retry_policy(
            ExponentialBackoff::builder()
                .retry_bounds(Duration::from_millis(1), Duration::from_millis(5))
                .build_with_max_retries(2),
        );

    let cid = site()[0].cid;
    let err = store.contains(&cid).await.unwrap_err();
    assert_matches!(err, ProbeError::Exhausted { attempts: 3, cid: failed, .. } if failed == cid);
}

#[tokio::test]
async fn test_unexpected_probe_status_is_fatal() {
    let server = StoreServer::spawn().await;
    *server.state.probe_status.lock() = Some(StatusCode::BAD_GATEWAY);

    let uploader = DeduplicatingUploader::new(Arc::new(server.block_store()))
        .with_probe_throttle(Duration::ZERO);
    let err = uploader.upload(&site()).await.unwrap_err();
    assert_matches!(
        err,
        UploadError::Probe(ProbeError::UnexpectedStatus {
            status: StatusCode::BAD_GATEWAY,
            ..
        })
    );
    assert_eq!(server.write_count(), 0);
}
