#![deny(missing_docs)]

//! Streaming chat completions for sitesmith.
//!
//! [`OpenAiClient`] talks to an OpenAI compatible chat completions endpoint and exposes the
//! answer as a [`DeltaStream`] of text increments. [`ResponseAssembler`] turns such a stream into
//! a single assistant message and transparently recovers when the conversation has grown too
//! large for the context window of the model.

mod assembler;
mod client;
mod message;
pub mod stream;

pub use assembler::{
    AssembleError, Assembled, AssemblerListener, AssemblerState, Outcome, Phase,
    ResponseAssembler,
};
pub use client::{CompletionClient, CompletionError, OpenAiClient, CONTEXT_LENGTH_EXCEEDED};
pub use message::{Message, Role};
pub use stream::{decode_stream, DeltaStream, StreamError};
