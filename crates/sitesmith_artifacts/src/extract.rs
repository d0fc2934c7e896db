//! Scanning of assistant text for delimited file blocks.
//!
//! A block looks like this:
//!
//! ```text
//! ---index.html---
//! <html></html>
//! ---index.html end---
//! ```
//!
//! The name is made of ASCII letters, digits, `.`, `-`, `_` and `/`. A single line break right
//! after the opening marker is not part of the content, everything up to the closing marker is.

use std::fmt;

use crate::store::{Artifact, ArtifactStore};

const MARKER: &str = "---";
const CLOSING_SUFFIX: &str = " end---";

/// Returns true if `c` may appear in an artifact name.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/')
}

/// Returns true if `name` can be used as an artifact name in a delimited block.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(MARKER) && name.chars().all(is_name_char)
}

/// Why a block was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    /// The first closing marker after the opening marker names another artifact.
    MismatchedClose {
        /// The name used by the closing marker.
        closing: String,
    },
    /// No closing marker follows the opening marker.
    Unterminated,
}

/// A block that was opened but could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedBlock {
    /// Byte offset of the opening marker in the scanned text.
    pub offset: usize,
    /// The name used by the opening marker.
    pub name: String,
    /// Why the block was skipped.
    pub kind: MalformedKind,
}

impl fmt::Display for MalformedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MalformedKind::MismatchedClose { closing } => write!(
                f,
                "block '{}' at offset {} is closed as '{}'",
                self.name, self.offset, closing
            ),
            MalformedKind::Unterminated => write!(
                f,
                "block '{}' at offset {} is never closed",
                self.name, self.offset
            ),
        }
    }
}

/// The result of scanning a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Every well-formed block, in the order they appear. A name may occur more than once.
    pub artifacts: Vec<Artifact>,
    /// Blocks that were skipped.
    pub diagnostics: Vec<MalformedBlock>,
}

impl Extraction {
    /// Returns true if no well-formed block was found.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Upserts every extracted artifact into `store` in order, so the last block of a name wins.
    pub fn apply(&self, store: &ArtifactStore) {
        for artifact in &self.artifacts {
            store.upsert(artifact.name.clone(), artifact.content.clone());
        }
    }
}

/// Parses an opening marker `---<name>---` at the start of `text`. Returns the name and the
/// length of the marker.
fn opening_marker(text: &str) -> Option<(&str, usize)> {
    let rest = text.strip_prefix(MARKER)?;
    let line = rest.split('\n').next().unwrap_or(rest);
    let end = line.find(MARKER)?;
    let name = &line[..end];
    is_valid_name(name).then_some((name, MARKER.len() + end + MARKER.len()))
}

/// Parses a closing marker `---<name> end---` at the start of `text`. Returns the name and the
/// length of the marker.
fn closing_marker(text: &str) -> Option<(&str, usize)> {
    let rest = text.strip_prefix(MARKER)?;
    let end = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
    let name = &rest[..end];
    if !is_valid_name(name) || !rest[end..].starts_with(CLOSING_SUFFIX) {
        return None;
    }
    Some((name, MARKER.len() + end + CLOSING_SUFFIX.len()))
}

/// Finds the first closing marker at or after `from`. Returns its offset, name and length.
fn find_closing(text: &str, from: usize) -> Option<(usize, &str, usize)> {
    let mut pos = from;
    while let Some(found) = text[pos..].find(MARKER) {
        let start = pos + found;
        if let Some((name, len)) = closing_marker(&text[start..]) {
            return Some((start, name, len));
        }
        pos = start + 1;
    }
    None
}

fn skip_line_break(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    if rest.starts_with("\r\n") {
        pos + 2
    } else if rest.starts_with('\n') {
        pos + 1
    } else {
        pos
    }
}

/// Scans `text` for delimited blocks.
///
/// Blocks whose closing marker names a different artifact, and blocks that are never closed,
/// are skipped and reported in [`Extraction::diagnostics`]. Scanning resumes right after the
/// opening marker of a skipped block so a block nested in it can still be found.
pub fn extract(text: &str) -> Extraction {
    let mut extraction = Extraction::default();
    let mut pos = 0;

    while let Some(found) = text[pos..].find(MARKER) {
        let start = pos + found;
        let Some((name, opening_len)) = opening_marker(&text[start..]) else {
            pos = start + 1;
            continue;
        };

        let content_start = skip_line_break(text, start + opening_len);
        match find_closing(text, content_start) {
            Some((close_start, closing, closing_len)) if closing == name => {
                extraction.artifacts.push(Artifact {
                    name: name.to_string(),
                    content: text[content_start..close_start].to_string(),
                });
                pos = close_start + closing_len;
            }
            closing => {
                let kind = match closing {
                    Some((_, closing, _)) => MalformedKind::MismatchedClose {
                        closing: closing.to_string(),
                    },
                    None => MalformedKind::Unterminated,
                };
                let malformed = MalformedBlock {
                    offset: start,
                    name: name.to_string(),
                    kind,
                };
                tracing::warn!("skipping malformed artifact block: {malformed}");
                extraction.diagnostics.push(malformed);
                pos = start + opening_len;
            }
        }
    }

    extraction
}
