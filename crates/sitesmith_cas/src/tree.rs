use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;

use crate::{
    cid::{Cid, Codec},
    dag_pb::{encode_directory, Link},
};

/// A single content-addressed block, either raw artifact bytes or an encoded directory node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The identifier of `data`.
    pub cid: Cid,

    /// The bytes of the block.
    pub data: Bytes,
}

impl Block {
    /// Constructs a block from its bytes, computing the identifier.
    pub fn new(codec: Codec, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            cid: Cid::for_block(codec, &data),
            data,
        }
    }

    /// The length of the block in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the block has no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The result of addressing a set of artifacts: a root identifier and every block needed to
/// reconstruct the tree.
#[derive(Debug, Clone)]
pub struct AddressedTree {
    root: Cid,
    size: u64,
    blocks: Vec<Block>,
}

impl AddressedTree {
    /// The identifier of the root directory.
    pub fn root(&self) -> Cid {
        self.root
    }

    /// The cumulative size of the tree, as it would appear in a link to the root.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// All blocks in postorder, the root directory last. Every identifier appears once.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Consumes the tree and returns its blocks.
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

/// An error that can occur when building a tree from artifact names.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    /// The name cannot be split into a valid path.
    #[error("invalid artifact path '{name}': {reason}")]
    InvalidPath {
        /// The offending artifact name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A path is used for a file and as the parent directory of another artifact.
    #[error("'{path}' is used both as a file and as a directory")]
    PathConflict {
        /// The conflicting path.
        path: String,
    },
}

#[derive(Default)]
struct DirectoryNode {
    entries: BTreeMap<String, Entry>,
}

enum Entry {
    File(Bytes),
    Directory(DirectoryNode),
}

impl DirectoryNode {
    fn insert(&mut self, name: &str, content: Bytes) -> Result<(), AddressError> {
        let segments = split_path(name)?;
        let Some((file_name, parents)) = segments.split_last() else {
            return Err(invalid(name, "the path is empty"));
        };

        let mut dir = self;
        for (idx, segment) in parents.iter().enumerate() {
            let entry = dir
                .entries
                .entry((*segment).to_owned())
                .or_insert_with(|| Entry::Directory(DirectoryNode::default()));
            dir = match entry {
                Entry::Directory(dir) => dir,
                Entry::File(_) => {
                    return Err(AddressError::PathConflict {
                        path: segments[..=idx].join("/"),
                    })
                }
            };
        }

        match dir.entries.get(*file_name) {
            Some(Entry::Directory(_)) => Err(AddressError::PathConflict {
                path: name.to_owned(),
            }),
            _ => {
                dir.entries
                    .insert((*file_name).to_owned(), Entry::File(content));
                Ok(())
            }
        }
    }

    /// Resolves the identifiers of this directory and everything below it, appending newly seen
    /// blocks to `blocks`. Returns the identifier and the cumulative size of this directory.
    fn resolve(&self, blocks: &mut BlockList) -> (Cid, u64) {
        let mut links = Vec::with_capacity(self.entries.len());
        for (name, entry) in &self.entries {
            let (cid, size) = match entry {
                Entry::File(content) => {
                    let block = Block::new(Codec::Raw, content.clone());
                    let cid = block.cid;
                    blocks.push(block);
                    (cid, content.len() as u64)
                }
                Entry::Directory(dir) => dir.resolve(blocks),
            };
            links.push(Link {
                name: name.clone(),
                cid,
                size,
            });
        }

        let node = encode_directory(&links);
        let size = node.len() as u64 + links.iter().map(|link| link.size).sum::<u64>();
        let block = Block::new(Codec::DagPb, node);
        let cid = block.cid;
        blocks.push(block);
        (cid, size)
    }
}

#[derive(Default)]
struct BlockList {
    seen: HashSet<Cid>,
    blocks: Vec<Block>,
}

impl BlockList {
    fn push(&mut self, block: Block) {
        if self.seen.insert(block.cid) {
            self.blocks.push(block);
        }
    }
}

fn invalid(name: &str, reason: &'static str) -> AddressError {
    AddressError::InvalidPath {
        name: name.to_owned(),
        reason,
    }
}

fn split_path(name: &str) -> Result<Vec<&str>, AddressError> {
    if name.is_empty() {
        return Err(invalid(name, "the path is empty"));
    }
    name.split('/')
        .map(|segment| match segment {
            "" => Err(invalid(name, "the path contains an empty segment")),
            "." | ".." => Err(invalid(name, "relative segments are not allowed")),
            segment => Ok(segment),
        })
        .collect()
}

/// Builds a Merkle directory over a set of `(name, content)` pairs.
///
/// Names are split on `/` into nested directories. Links inside every directory are sorted by
/// name, so the root identifier only depends on the set of pairs and never on the order in which
/// they are given. If the same name occurs more than once, the last content wins.
///
/// ```
/// # use sitesmith_cas::address;
/// let tree = address([("index.html", "<html></html>\n"), ("style.css", "body{}\n")]).unwrap();
/// assert_eq!(
///     tree.root().to_string(),
///     "bafybeibvf6htouhjzt6f637kkmaoawbpsj5gv2l6fmkf2w4zi7hscpkzi4"
/// );
/// assert_eq!(tree.blocks().len(), 3);
/// ```
pub fn address<I, N, C>(entries: I) -> Result<AddressedTree, AddressError>
where
    I: IntoIterator<Item = (N, C)>,
    N: AsRef<str>,
    C: Into<Bytes>,
{
    let mut root = DirectoryNode::default();
    for (name, content) in entries {
        root.insert(name.as_ref(), content.into())?;
    }

    let mut blocks = BlockList::default();
    let (cid, size) = root.resolve(&mut blocks);
    Ok(AddressedTree {
        root: cid,
        size,
        blocks: blocks.blocks,
    })
}
