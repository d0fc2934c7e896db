#![deny(missing_docs)]

//! Content addressing of artifact sets.
//!
//! A set of `(name, content)` pairs is turned into a Merkle directory: every artifact becomes a
//! raw block, every directory becomes a dag-pb node linking to its entries, and the identifier of
//! the root node commits to the whole tree.
//!
//! # Components
//!
//! - [`Cid`]: version 1 content identifiers and their base32 string form
//! - [`dag_pb`]: the directory node encoding
//! - [`address`]: builds the tree and returns the root identifier plus every block
//! - [`write_blocks`]: stores blocks in a local directory keyed by identifier
//!
//! # Usage
//!
//! ```rust
//! use sitesmith_cas::address;
//!
//! let tree = address([
//!     ("index.html", "<html></html>\n"),
//!     ("css/style.css", "body{}\n"),
//! ])
//! .unwrap();
//!
//! // The root is always the last block.
//! assert_eq!(tree.blocks().last().unwrap().cid, tree.root());
//! println!("ipfs://{}", tree.root());
//! ```

mod block_writer;
pub mod cid;
pub mod dag_pb;
mod tree;
mod varint;

pub use block_writer::{block_path, write_block, write_blocks};
pub use cid::{Cid, Codec, ParseCidError};
pub use tree::{address, AddressError, AddressedTree, Block};
pub use varint::VarintError;
