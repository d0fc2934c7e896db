#![deny(missing_docs)]

//! Publishing of content-addressed blocks to a remote store.
//!
//! A [`DeduplicatingUploader`] first checks which blocks a [`BlockStore`] already holds, then
//! splits the missing blocks into bounded [`UploadBatch`]es and writes them one by one.
//! [`HttpBlockStore`] implements the store on top of an HTTP gateway and store endpoint.

mod batch;
mod reporter;
mod store;
mod uploader;

pub use batch::{
    split_into_batches, BatchLimits, UploadBatch, DEFAULT_MAX_BATCH_BYTES,
    DEFAULT_MAX_BATCH_ITEMS,
};
pub use reporter::Reporter;
pub use store::{
    classify_rejection, BlockStore, HttpBlockStore, ProbeError, PutOutcome, StoreError,
    ALREADY_APPLIED_MARKERS, DEFAULT_PROBE_ATTEMPTS, DEFAULT_PROBE_TIMEOUT,
};
pub use uploader::{
    DeduplicatingUploader, UploadError, UploadSummary, DEFAULT_PROBE_CONCURRENCY,
    DEFAULT_PROBE_THROTTLE,
};
