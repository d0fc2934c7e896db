//! Clients for chat completion APIs.

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use sitesmith_networking::Redact;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    message::Message,
    stream::{decode_stream, DeltaStream},
};

/// The error code with which the provider rejects a conversation that does not fit the context
/// window of the model.
pub const CONTEXT_LENGTH_EXCEEDED: &str = "context_length_exceeded";

/// An error that can occur when requesting a completion.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The conversation does not fit the context window of the model.
    #[error("the conversation exceeds the context window of the model: {message}")]
    ContextLengthExceeded {
        /// The message of the provider.
        message: String,
    },

    /// The provider responded with a non-success status.
    #[error("Error from AI: {message} ({status})")]
    Provider {
        /// The status of the response.
        status: StatusCode,
        /// The error code of the provider, if any.
        code: Option<String>,
        /// The message of the provider.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error(transparent)]
    Transport(#[from] reqwest_middleware::Error),

    /// The request body could not be encoded.
    #[error("failed to encode the completion request")]
    InvalidRequest(#[from] serde_json::Error),

    /// The response was successful but could not be interpreted.
    #[error("the completion response could not be decoded: {0}")]
    InvalidResponse(String),

    /// The request was cancelled before a response arrived.
    #[error("the request was cancelled")]
    Cancelled,
}

/// A model that produces assistant messages for a conversation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Requests a streamed completion of `messages`.
    ///
    /// Errors reported by the provider before the stream starts are returned from this function;
    /// in particular a context overflow is reported as [`CompletionError::ContextLengthExceeded`].
    /// The returned stream stops without error when `cancel` is triggered.
    async fn stream(
        &self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<DeltaStream, CompletionError>;

    /// Requests a completion of `messages` and returns the whole content at once.
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// A client for OpenAI compatible chat completion endpoints.
///
/// Authentication is left to the middleware of the HTTP client, see
/// [`sitesmith_networking::client_with_middleware`].
#[derive(Clone)]
pub struct OpenAiClient {
    client: ClientWithMiddleware,
    api_url: Url,
    model: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_url", &self.api_url.clone().redact())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Constructs a client that requests completions from `model` at `api_url`.
    pub fn new(client: ClientWithMiddleware, api_url: Url, model: impl Into<String>) -> Self {
        Self {
            client,
            api_url,
            model: model.into(),
        }
    }

    /// The model completions are requested from.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        let body = serde_json::to_vec(&ChatCompletionRequest {
            model: &self.model,
            messages,
            stream,
        })?;

        tracing::debug!(
            "requesting a completion of {} messages from {} (stream: {stream})",
            messages.len(),
            self.model
        );

        let response = self
            .client
            .post(self.api_url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(Redact::redact)?;

        check_response(response).await
    }
}

/// Turns a non-success response into a [`CompletionError`].
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, CompletionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse { error }) if error.code.as_deref() == Some(CONTEXT_LENGTH_EXCEEDED) => {
            Err(CompletionError::ContextLengthExceeded {
                message: error.message,
            })
        }
        Ok(ErrorResponse { error }) => Err(CompletionError::Provider {
            status,
            code: error.code,
            message: error.message,
        }),
        Err(_) => Err(CompletionError::Provider {
            status,
            code: None,
            message: format!(
                "{}: {}",
                status.canonical_reason().unwrap_or("unknown status"),
                body.trim()
            ),
        }),
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn stream(
        &self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<DeltaStream, CompletionError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
            response = self.send(messages, true) => response?,
        };
        Ok(decode_stream(response.bytes_stream(), cancel))
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let response = self.send(messages, false).await?;
        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(reqwest_middleware::Error::from(e.redact())))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CompletionError::InvalidResponse("the response contains no message".to_string())
            })
    }
}
