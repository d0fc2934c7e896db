use std::{convert::Infallible, future::IntoFuture, net::SocketAddr, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::post,
    Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sitesmith_chat::{
    AssembleError, CompletionClient, CompletionError, Message, OpenAiClient, Outcome,
    ResponseAssembler,
};
use sitesmith_networking::retry_policies::DoNotRetryPolicy;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

const API_KEY: &str = "sk-test";
const DIRECTIVE: &str = "Please summarize previous messages.";

/// Conversations that start with a system prompt may hold at most this many messages.
const MAX_MESSAGES: usize = 3;

#[derive(Default)]
struct ServerState {
    requests: Mutex<Vec<Value>>,
}

struct CompletionServer {
    shutdown_sender: Option<oneshot::Sender<()>>,
    local_address: SocketAddr,
    state: Arc<ServerState>,
}

impl CompletionServer {
    fn url(&self) -> Url {
        Url::parse(&format!("http://{}/v1/chat/completions", self.local_address)).unwrap()
    }

    fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().clone()
    }
}

impl Drop for CompletionServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_sender.take() {
            let _ = tx.send(());
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "error": { "message": message, "type": "invalid_request_error", "code": code } })
                .to_string(),
        ))
        .unwrap()
}

/// Streams `chunks` as completion records, cut into reads of 5 bytes.
fn event_stream(chunks: &[String]) -> Response {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({ "object": "chat.completion.chunk", "choices": [{ "index": 0, "delta": { "content": chunk } }] })
        ));
    }
    body.push_str("data: [DONE]\n\n");

    let reads: Vec<Result<Vec<u8>, Infallible>> =
        body.as_bytes().chunks(5).map(|c| Ok(c.to_vec())).collect();

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(futures::stream::iter(reads)))
        .unwrap()
}

async fn completions(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: Value = serde_json::from_slice(&body).unwrap();
    state.requests.lock().push(request.clone());

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer {API_KEY}").as_str());
    if !authorized {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_api_key",
            "Incorrect API key provided",
        );
    }

    let messages = request["messages"].as_array().unwrap();
    if messages.len() > MAX_MESSAGES && messages[0]["role"] == "system" {
        return error_response(
            StatusCode::BAD_REQUEST,
            "context_length_exceeded",
            "This model's maximum context length is 4097 tokens.",
        );
    }

    let last = messages.last().unwrap()["content"].as_str().unwrap();
    let answer = if last == DIRECTIVE {
        "The user wants a landing page.".to_string()
    } else {
        format!("You asked: {last}")
    };

    if request["stream"] == true {
        let words: Vec<String> = answer.split_inclusive(' ').map(str::to_string).collect();
        event_stream(&words)
    } else {
        Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "object": "chat.completion",
                    "choices": [{ "index": 0, "message": { "role": "assistant", "content": answer } }]
                })
                .to_string(),
            ))
            .unwrap()
    }
}

async fn spawn() -> CompletionServer {
    let state = Arc::new(ServerState::default());
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
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

    CompletionServer {
        shutdown_sender: Some(tx),
        local_address,
        state,
    }
}

fn client(server: &CompletionServer, token: &str) -> OpenAiClient {
    let client = sitesmith_networking::client_with_middleware(
        reqwest::Client::new(),
        None::<DoNotRetryPolicy>,
        Some(token.to_string()),
    );
    OpenAiClient::new(client, server.url(), "gpt-test")
}

#[tokio::test]
async fn test_streamed_round_trip() {
    let server = spawn().await;
    let assembler = ResponseAssembler::new(Arc::new(client(&server, API_KEY)), DIRECTIVE);

    let assembled = assembler
        .assemble(
            &[Message::system("You build websites.")],
            "a blog",
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(assembled.outcome, Outcome::Completed);
    assert_eq!(assembled.content, "You asked: a blog");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], "gpt-test");
    assert_eq!(requests[0]["stream"], true);
    assert_eq!(
        requests[0]["messages"],
        json!([
            { "role": "system", "content": "You build websites." },
            { "role": "user", "content": "a blog" }
        ])
    );
}

#[tokio::test]
async fn test_context_overflow_is_recovered() {
    let server = spawn().await;
    let assembler = ResponseAssembler::new(Arc::new(client(&server, API_KEY)), DIRECTIVE);

    let history = vec![
        Message::system("You build websites."),
        Message::user("a landing page"),
        Message::assistant("---index.html---\n<html></html>\n---index.html end---"),
    ];
    let assembled = assembler
        .assemble(&history, "add a footer", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(assembled.outcome, Outcome::Recovered);
    assert_eq!(
        assembled.content,
        "The user wants a landing page.You asked: add a footer"
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1]["messages"].as_array().unwrap().len(), 4);
    assert_eq!(requests[1]["messages"][3]["content"], DIRECTIVE);
    assert_eq!(
        requests[2]["messages"],
        json!([
            { "role": "system", "content": "You build websites." },
            { "role": "assistant", "content": "The user wants a landing page." },
            { "role": "user", "content": "add a footer" }
        ])
    );
}

#[tokio::test]
async fn test_complete_without_streaming() {
    let server = spawn().await;
    let client = client(&server, API_KEY);

    let content = client.complete(&[Message::user("hello")]).await.unwrap();
    assert_eq!(content, "You asked: hello");
    assert_eq!(server.requests()[0]["stream"], false);
}

#[tokio::test]
async fn test_provider_error_message() {
    let server = spawn().await;
    let client = client(&server, "sk-wrong");

    let err = client
        .stream(&[Message::user("hello")], CancellationToken::new())
        .await
        .err()
        .unwrap();
    match &err {
        CompletionError::Provider {
            status,
            code,
            message,
        } => {
            assert_eq!(*status, StatusCode::UNAUTHORIZED);
            assert_eq!(code.as_deref(), Some("invalid_api_key"));
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("Error from AI: Incorrect API key provided"));

    let assembler = ResponseAssembler::new(Arc::new(client), DIRECTIVE);
    let err = assembler
        .assemble(&[], "hello", CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssembleError::Completion(CompletionError::Provider { .. })
    ));
}

#[tokio::test]
async fn test_cancelled_before_response() {
    let server = spawn().await;
    let client = client(&server, API_KEY);

    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        client.stream(&[Message::user("hello")], cancel).await,
        Err(CompletionError::Cancelled)
    ));
}
