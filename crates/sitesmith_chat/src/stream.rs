//! Decoding of server-sent chat completion chunks into text increments.

use std::fmt::Display;

use eventsource_stream::Eventsource;
use futures::{stream::BoxStream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// The data of the record that terminates a completion stream.
pub const DONE_MARKER: &str = "[DONE]";

/// A lazy sequence of non-empty text increments.
pub type DeltaStream = BoxStream<'static, Result<String, StreamError>>;

/// An error that ends a [`DeltaStream`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    /// Reading the underlying byte stream failed.
    #[error("failed to read the completion stream: {0}")]
    Transport(String),

    /// The provider reported an error in the middle of the stream.
    #[error("the model API reported an error: {message}")]
    Provider {
        /// The message of the provider.
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What a single event record contained.
#[derive(Debug, PartialEq, Eq)]
enum Record {
    Delta(String),
    Empty,
    Done,
    Error(String),
    Malformed(String),
}

fn extract_error_message(event: &Value) -> Option<String> {
    let error = event.get("error")?;
    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    Some("an error occurred during streaming".to_string())
}

fn parse_record(data: &str) -> Record {
    if data == DONE_MARKER {
        return Record::Done;
    }
    if data.trim().is_empty() {
        return Record::Empty;
    }

    let event: Value = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => return Record::Malformed(e.to_string()),
    };
    if let Some(message) = extract_error_message(&event) {
        return Record::Error(message);
    }

    match serde_json::from_value::<ChatCompletionChunk>(event) {
        Ok(chunk) => match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(content) if !content.is_empty() => Record::Delta(content),
            _ => Record::Empty,
        },
        Err(e) => Record::Malformed(e.to_string()),
    }
}

/// Decodes an event-framed byte stream into a stream of text increments.
///
/// Records are reassembled across reads, so a record may be split over any number of chunks of
/// the underlying stream. The stream ends at the `[DONE]` record, at the end of the underlying
/// stream, or as soon as `cancel` is triggered; in the last case no error is produced. Records
/// that cannot be interpreted are logged and skipped.
pub fn decode_stream<S, B, E>(bytes: S, cancel: CancellationToken) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let events = Box::pin(bytes.eventsource());
    futures::stream::unfold(Some((events, cancel)), |state| async move {
        let (mut events, cancel) = state?;
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("completion stream cancelled");
                    return None;
                }
                event = events.next() => event,
            };

            let event = match event {
                None => return None,
                Some(Ok(event)) => event,
                Some(Err(e)) => return Some((Err(StreamError::Transport(e.to_string())), None)),
            };

            match parse_record(&event.data) {
                Record::Delta(content) => return Some((Ok(content), Some((events, cancel)))),
                Record::Empty => continue,
                Record::Done => return None,
                Record::Error(message) => {
                    return Some((Err(StreamError::Provider { message }), None))
                }
                Record::Malformed(reason) => {
                    tracing::warn!("skipping malformed completion record ({reason}): {}", event.data);
                }
            }
        }
    })
    .boxed()
}
