//! Version 1 content identifiers.
//!
//! A [`Cid`] is a pure function of a codec tag and the bytes of a block: the same `(codec, bytes)`
//! always produces the same identifier. The binary form is
//!
//! ```text
//! varint(version = 1) | varint(codec) | varint(0x12 = sha2-256) | varint(32) | digest
//! ```
//!
//! and the canonical string form is the multibase prefix `b` followed by the binary form in
//! lowercase RFC 4648 base32 without padding, e.g. `bafkrei...` for raw blocks and `bafybei...`
//! for directory nodes.

use std::{fmt, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use sitesmith_digest::{compute_bytes_digest, Sha256, Sha256Hash, SHA256_LEN};

use crate::varint::{decode_varint, push_varint, VarintError};

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648Lower { padding: false };

/// Multibase prefix of lowercase base32 without padding.
const MULTIBASE_BASE32: char = 'b';

/// Multihash code of sha2-256.
const MULTIHASH_SHA2_256: u64 = 0x12;

/// The only CID version this crate produces.
pub const CID_VERSION: u64 = 1;

/// The codec of the block a [`Cid`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Codec {
    /// Raw bytes, used for artifact contents.
    Raw,
    /// A dag-pb encoded directory node.
    DagPb,
}

impl Codec {
    /// The multicodec code of this codec.
    pub const fn code(self) -> u64 {
        match self {
            Codec::Raw => 0x55,
            Codec::DagPb => 0x70,
        }
    }

    /// Returns the codec for a multicodec code, if it is one we know.
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            0x55 => Some(Codec::Raw),
            0x70 => Some(Codec::DagPb),
            _ => None,
        }
    }
}

/// A content identifier: version 1, a [`Codec`] and the SHA-256 digest of the block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub struct Cid {
    codec: Codec,
    hash: Sha256Hash,
}

impl Cid {
    /// Constructs an identifier from an already computed digest.
    pub fn new(codec: Codec, hash: Sha256Hash) -> Self {
        Self { codec, hash }
    }

    /// Hashes `data` and returns the identifier of the block under the given codec.
    pub fn for_block(codec: Codec, data: impl AsRef<[u8]>) -> Self {
        Self::new(codec, compute_bytes_digest::<Sha256>(data))
    }

    /// The identifier version. Always [`CID_VERSION`].
    pub fn version(&self) -> u64 {
        CID_VERSION
    }

    /// The codec of the block.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// The SHA-256 digest of the block.
    pub fn hash(&self) -> &Sha256Hash {
        &self.hash
    }

    /// The binary form of this identifier.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + SHA256_LEN);
        push_varint(&mut bytes, CID_VERSION);
        push_varint(&mut bytes, self.codec.code());
        push_varint(&mut bytes, MULTIHASH_SHA2_256);
        push_varint(&mut bytes, SHA256_LEN as u64);
        bytes.extend_from_slice(&self.hash);
        bytes
    }

    /// Parses the binary form of an identifier.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseCidError> {
        let mut rest = bytes;
        let mut next = |what: &'static str| -> Result<u64, ParseCidError> {
            let (value, len) =
                decode_varint(rest).map_err(|e| ParseCidError::InvalidVarint(what, e))?;
            rest = &rest[len..];
            Ok(value)
        };

        let version = next("version")?;
        if version != CID_VERSION {
            return Err(ParseCidError::UnsupportedVersion(version));
        }
        let codec = next("codec")?;
        let codec = Codec::from_code(codec).ok_or(ParseCidError::UnknownCodec(codec))?;
        let hash_code = next("multihash code")?;
        if hash_code != MULTIHASH_SHA2_256 {
            return Err(ParseCidError::UnsupportedHash(hash_code));
        }
        let len = next("multihash length")?;
        if len != SHA256_LEN as u64 || rest.len() != SHA256_LEN {
            return Err(ParseCidError::InvalidDigestLength(rest.len()));
        }

        let mut hash = Sha256Hash::default();
        hash.copy_from_slice(rest);
        Ok(Self { codec, hash })
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{MULTIBASE_BASE32}{}",
            base32::encode(BASE32, &self.to_bytes())
        )
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cid").field(&self.to_string()).finish()
    }
}

impl FromStr for Cid {
    type Err = ParseCidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(MULTIBASE_BASE32)
            .ok_or_else(|| ParseCidError::UnsupportedMultibase(s.chars().next()))?;
        let bytes = base32::decode(BASE32, encoded).ok_or(ParseCidError::InvalidBase32)?;
        Self::from_bytes(&bytes)
    }
}

/// An error that can occur when parsing a [`Cid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCidError {
    /// The string does not start with the base32 multibase prefix.
    #[error("unsupported multibase prefix {0:?}, only base32 ('b') is supported")]
    UnsupportedMultibase(Option<char>),

    /// The string is not valid lowercase base32.
    #[error("invalid base32 encoding")]
    InvalidBase32,

    /// One of the header fields is not a valid varint.
    #[error("invalid varint for the {0}: {1:?}")]
    InvalidVarint(&'static str, VarintError),

    /// Only version 1 identifiers are supported.
    #[error("unsupported cid version {0}")]
    UnsupportedVersion(u64),

    /// The codec is neither raw nor dag-pb.
    #[error("unknown codec {0:#x}")]
    UnknownCodec(u64),

    /// The multihash is not sha2-256.
    #[error("unsupported multihash {0:#x}, only sha2-256 is supported")]
    UnsupportedHash(u64),

    /// The digest does not have the length of a sha2-256 digest.
    #[error("invalid digest length {0}")]
    InvalidDigestLength(usize),
}
