//! Minimal dag-pb encoding of UnixFS directory nodes.
//!
//! Only the subset needed to describe a directory is implemented. A node is written as its links
//! (protobuf field 2) in name order followed by the UnixFS `Data` message (field 1) that marks the
//! node as a directory.

use crate::{
    cid::Cid,
    varint::{push_varint, varint_len},
};

/// The UnixFS `Data` message `{ Type: Directory }`.
pub const DIRECTORY_MARKER: [u8; 2] = [0x08, 0x01];

const PB_NODE_DATA: u8 = 0x0a;
const PB_NODE_LINKS: u8 = 0x12;
const PB_LINK_HASH: u8 = 0x0a;
const PB_LINK_NAME: u8 = 0x12;
const PB_LINK_TSIZE: u8 = 0x18;

/// A named link from a directory node to a child block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// The name of the entry inside the directory.
    pub name: String,

    /// The identifier of the child block.
    pub cid: Cid,

    /// The cumulative size of the child. For a file this is the content length, for a directory
    /// it is the encoded node plus the sizes of all its links.
    pub size: u64,
}

/// Encodes a directory node with the given links.
///
/// The links are written in the order they are given. Callers are responsible for sorting them
/// by name, which [`crate::address`] always does.
pub fn encode_directory<'a>(links: impl IntoIterator<Item = &'a Link>) -> Vec<u8> {
    let mut node = Vec::new();
    let mut link_buf = Vec::new();
    for link in links {
        link_buf.clear();
        encode_link(&mut link_buf, link);
        node.push(PB_NODE_LINKS);
        push_bytes(&mut node, &link_buf);
    }
    node.push(PB_NODE_DATA);
    push_bytes(&mut node, &DIRECTORY_MARKER);
    node
}

fn encode_link(buf: &mut Vec<u8>, link: &Link) {
    buf.push(PB_LINK_HASH);
    push_bytes(buf, &link.cid.to_bytes());
    buf.push(PB_LINK_NAME);
    push_bytes(buf, link.name.as_bytes());
    buf.push(PB_LINK_TSIZE);
    push_varint(buf, link.size);
}

fn push_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.reserve(varint_len(bytes.len() as u64) + bytes.len());
    push_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}
