#![deny(missing_docs)]

//! Small hashing helpers built on the [RustCrypto/hashes](https://github.com/RustCrypto/hashes)
//! crates.
//!
//! Every identifier sitesmith computes is derived from a SHA-256 digest of a block. This crate
//! keeps that choice in one place so the addresser, the local block export and the store adapters
//! all agree on it.
//!
//! # Examples
//!
//! ```
//! use sitesmith_digest::{compute_bytes_digest, Sha256};
//!
//! let hash = compute_bytes_digest::<Sha256>("Hello, world!");
//! assert_eq!(
//!     format!("{hash:x}"),
//!     "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
//! );
//! ```

pub use digest;

use digest::{Digest, Output};
use std::io::Write;

pub use sha2::Sha256;

/// A type alias for the output of a SHA256 hash.
pub type Sha256Hash = sha2::digest::Output<Sha256>;

/// The length in bytes of a [`Sha256Hash`].
pub const SHA256_LEN: usize = 32;

/// Compute a hash of the specified bytes.
pub fn compute_bytes_digest<D: Digest + Default>(bytes: impl AsRef<[u8]>) -> Output<D> {
    let mut hasher = D::default();
    hasher.update(bytes);
    hasher.finalize()
}

/// A simple object that provides a [`Write`] implementation that also immediately hashes the bytes
/// written to it. Call [`HashingWriter::finalize`] to retrieve both the original `impl Write`
/// object as well as the hash.
pub struct HashingWriter<W, D: Digest> {
    writer: W,
    hasher: D,
}

impl<W, D: Digest + Default> HashingWriter<W, D> {
    /// Constructs a new instance from a writer and a new (empty) hasher.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            hasher: Default::default(),
        }
    }
}

impl<W, D: Digest> HashingWriter<W, D> {
    /// Consumes this instance and returns the original writer and the hash of all bytes written to
    /// this instance.
    pub fn finalize(self) -> (W, Output<D>) {
        (self.writer, self.hasher.finalize())
    }
}

impl<W: Write, D: Digest> Write for HashingWriter<W, D> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes = self.writer.write(buf)?;
        self.hasher.update(&buf[..bytes]);
        Ok(bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
