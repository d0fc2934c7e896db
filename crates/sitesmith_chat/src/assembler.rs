//! Assembly of a single assistant message from one or more completion streams.

use std::{fmt, sync::Arc};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{CompletionClient, CompletionError},
    message::{Message, Role},
    stream::{DeltaStream, StreamError},
};

/// Which request of a round-trip is being streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The request that was submitted.
    Primary,
    /// The request that summarizes the conversation after a context overflow.
    Summary,
    /// The request that answers the input again, based on the summary.
    Continuation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Primary => "primary",
            Phase::Summary => "summary",
            Phase::Continuation => "continuation",
        })
    }
}

/// The states a round-trip moves through.
///
/// ```text
/// Idle -> Streaming(Primary) -> Done | Failed | Recovering
/// Recovering -> Streaming(Summary) -> Streaming(Continuation) -> Done
/// ```
///
/// Cancellation moves any active state to `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssemblerState {
    /// Nothing has been requested yet.
    Idle,
    /// Increments of the given request are being received.
    Streaming(Phase),
    /// The provider rejected the conversation as too large.
    Recovering,
    /// The message is complete, or the round-trip was cancelled.
    Done,
    /// The round-trip failed.
    Failed,
}

/// How a round-trip ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The submitted request was answered.
    Completed,
    /// The conversation overflowed and was answered through a summary.
    Recovered,
    /// The round-trip was cancelled. The content holds what was received until then.
    Cancelled,
}

/// The result of a round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// Everything that was streamed, in order.
    pub content: String,

    /// How the round-trip ended.
    pub outcome: Outcome,
}

impl Assembled {
    /// Returns true if the round-trip was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.outcome == Outcome::Cancelled
    }

    /// Returns the assembled content as an assistant message.
    pub fn to_message(&self) -> Message {
        Message::assistant(self.content.clone())
    }
}

/// Receives updates while a message is assembled.
pub trait AssemblerListener: Send + Sync {
    /// Called whenever the assembler moves to another state.
    fn on_state_change(&self, _state: AssemblerState) {}

    /// Called for every increment that is appended to the message.
    fn on_delta(&self, _phase: Phase, _delta: &str) {}
}

/// An error that aborts a round-trip.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// The provider rejected the request.
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// The stream failed after it started.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// One of the requests made to recover from a context overflow failed.
    #[error("the {phase} request made to recover from a context overflow failed")]
    Recovery {
        /// The request that failed.
        phase: Phase,
        /// Why it failed.
        #[source]
        source: Box<AssembleError>,
    },
}

enum Drained {
    Finished,
    Cancelled,
}

/// Drives a round-trip with a [`CompletionClient`] and accumulates the streamed increments into
/// one message.
///
/// When the provider reports that the conversation does not fit the context window, the
/// assembler first asks for a summary of the conversation (without the system instruction) and
/// then asks again for an answer to the input, given only the system instruction and that
/// summary. Both answers are streamed into the same message.
#[derive(Clone)]
pub struct ResponseAssembler {
    client: Arc<dyn CompletionClient>,
    summary_directive: String,
    listener: Option<Arc<dyn AssemblerListener>>,
}

impl fmt::Debug for ResponseAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseAssembler")
            .field("summary_directive", &self.summary_directive)
            .finish_non_exhaustive()
    }
}

impl ResponseAssembler {
    /// Constructs a new assembler. `summary_directive` is the instruction used to summarize the
    /// conversation when it no longer fits the context window.
    pub fn new(client: Arc<dyn CompletionClient>, summary_directive: impl Into<String>) -> Self {
        Self {
            client,
            summary_directive: summary_directive.into(),
            listener: None,
        }
    }

    /// Reports state changes and increments to `listener`.
    pub fn with_listener(self, listener: Arc<dyn AssemblerListener>) -> Self {
        Self {
            listener: Some(listener),
            ..self
        }
    }

    /// Returns the client used for requests.
    pub fn client(&self) -> &Arc<dyn CompletionClient> {
        &self.client
    }

    fn report(&self, state: AssemblerState) {
        tracing::trace!("assembler state: {state:?}");
        if let Some(listener) = &self.listener {
            listener.on_state_change(state);
        }
    }

    /// Submits `history` followed by `input` as a user message and assembles the answer.
    ///
    /// Cancelling `cancel` ends the round-trip early with [`Outcome::Cancelled`] and whatever was
    /// received so far. It is never reported as an error.
    pub async fn assemble(
        &self,
        history: &[Message],
        input: &str,
        cancel: CancellationToken,
    ) -> Result<Assembled, AssembleError> {
        let mut content = String::new();
        match self.run(history, input, &cancel, &mut content).await {
            Ok(outcome) => {
                self.report(AssemblerState::Done);
                Ok(Assembled { content, outcome })
            }
            Err(err) => {
                self.report(AssemblerState::Failed);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        history: &[Message],
        input: &str,
        cancel: &CancellationToken,
        content: &mut String,
    ) -> Result<Outcome, AssembleError> {
        let mut request = history.to_vec();
        request.push(Message::user(input));

        self.report(AssemblerState::Streaming(Phase::Primary));
        match self.client.stream(&request, cancel.clone()).await {
            Ok(stream) => Ok(match self.drain(stream, Phase::Primary, cancel, content).await? {
                Drained::Finished => Outcome::Completed,
                Drained::Cancelled => Outcome::Cancelled,
            }),
            Err(CompletionError::Cancelled) => Ok(Outcome::Cancelled),
            Err(CompletionError::ContextLengthExceeded { message }) => {
                tracing::info!("the conversation no longer fits the model ({message}), summarizing");
                self.report(AssemblerState::Recovering);
                self.recover(history, input, cancel, content).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn recover(
        &self,
        history: &[Message],
        input: &str,
        cancel: &CancellationToken,
        content: &mut String,
    ) -> Result<Outcome, AssembleError> {
        let (system, rest) = match history.split_first() {
            Some((first, rest)) if first.role == Role::System => (Some(first), rest),
            _ => (None, history),
        };

        let mut summary_request = rest.to_vec();
        summary_request.push(Message::user(input));
        summary_request.push(Message::user(self.summary_directive.clone()));

        let summary_start = content.len();
        if let Drained::Cancelled = self
            .stream_phase(Phase::Summary, &summary_request, cancel, content)
            .await?
        {
            return Ok(Outcome::Cancelled);
        }
        let summary = content[summary_start..].to_string();

        let mut continuation_request = Vec::with_capacity(3);
        continuation_request.extend(system.cloned());
        continuation_request.push(Message::assistant(summary));
        continuation_request.push(Message::user(input));

        Ok(
            match self
                .stream_phase(Phase::Continuation, &continuation_request, cancel, content)
                .await?
            {
                Drained::Finished => Outcome::Recovered,
                Drained::Cancelled => Outcome::Cancelled,
            },
        )
    }

    /// Streams one of the recovery requests. Any failure is final.
    async fn stream_phase(
        &self,
        phase: Phase,
        messages: &[Message],
        cancel: &CancellationToken,
        content: &mut String,
    ) -> Result<Drained, AssembleError> {
        let recovery_error = |source: AssembleError| AssembleError::Recovery {
            phase,
            source: Box::new(source),
        };

        self.report(AssemblerState::Streaming(phase));
        let stream = match self.client.stream(messages, cancel.clone()).await {
            Ok(stream) => stream,
            Err(CompletionError::Cancelled) => return Ok(Drained::Cancelled),
            Err(err) => return Err(recovery_error(err.into())),
        };
        self.drain(stream, phase, cancel, content)
            .await
            .map_err(|err| recovery_error(err.into()))
    }

    async fn drain(
        &self,
        mut stream: DeltaStream,
        phase: Phase,
        cancel: &CancellationToken,
        content: &mut String,
    ) -> Result<Drained, StreamError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Drained::Cancelled),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(delta)) => {
                    content.push_str(&delta);
                    if let Some(listener) = &self.listener {
                        listener.on_delta(phase, &delta);
                    }
                }
                Some(Err(err)) => return Err(err),
                None if cancel.is_cancelled() => return Ok(Drained::Cancelled),
                None => return Ok(Drained::Finished),
            }
        }
    }
}
