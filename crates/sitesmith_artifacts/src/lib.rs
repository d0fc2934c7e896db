#![deny(missing_docs)]

//! The files of a generated website.
//!
//! Model output embeds files as delimited blocks. [`extract`] finds those blocks and
//! [`Extraction::apply`] upserts them into an [`ArtifactStore`]. The reserved [`SITEMAP`]
//! artifact lists the files the model intends to write; [`ArtifactStore::pending`] returns the
//! ones that are still missing.

mod extract;
mod sitemap;
mod store;

pub use extract::{extract, is_valid_name, Extraction, MalformedBlock, MalformedKind};
pub use sitemap::{parse_sitemap, SITEMAP};
pub use store::{Artifact, ArtifactStore, Upsert, SEED_INDEX_HTML};
