//! Export of blocks to a local directory.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use sitesmith_digest::{HashingWriter, Sha256};

use crate::{tree::Block, Cid};

/// Returns the directory used for partially written blocks.
fn temp_dir(root: &Path) -> PathBuf {
    root.join(".tmp")
}

/// Returns the path at which the block with the given identifier is stored below `root`.
pub fn block_path(root: &Path, cid: &Cid) -> PathBuf {
    root.join(cid.to_string())
}

/// Writes a single block to `root`.
///
/// The block is written to a temporary file first and only moved into place after its digest has
/// been verified against the identifier. If a block with the same identifier already exists the
/// write is skipped.
pub fn write_block(root: &Path, block: &Block) -> io::Result<PathBuf> {
    let path = block_path(root, &block.cid);
    if path.is_file() {
        return Ok(path);
    }

    let temp_dir = temp_dir(root);
    fs_err::create_dir_all(&temp_dir)?;
    let (file, temp_path) = tempfile::Builder::new()
        .tempfile_in(&temp_dir)?
        .into_parts();

    let mut writer = HashingWriter::<_, Sha256>::new(file);
    writer.write_all(&block.data)?;
    writer.flush()?;
    let (file, hash) = writer.finalize();
    drop(file);

    if hash.as_slice() != block.cid.hash().as_slice() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("block content does not match identifier {}", block.cid),
        ));
    }

    match temp_path.persist_noclobber(&path).map_err(io::Error::from) {
        Ok(()) => Ok(path),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(err) => Err(err),
    }
}

/// Writes all blocks to `root`, creating the directory if needed, and returns the paths of the
/// stored blocks in the same order.
pub fn write_blocks(root: &Path, blocks: &[Block]) -> io::Result<Vec<PathBuf>> {
    fs_err::create_dir_all(root)?;
    let paths = blocks
        .iter()
        .map(|block| write_block(root, block))
        .collect::<io::Result<Vec<_>>>()?;
    tracing::debug!("wrote {} blocks to {}", paths.len(), root.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{address, Codec};
    use bytes::Bytes;

    #[test]
    fn test_write_blocks() {
        let tree = address([("index.html", "<html></html>\n"), ("style.css", "body{}\n")]).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let paths = write_blocks(dir.path(), tree.blocks()).unwrap();
        assert_eq!(paths.len(), 3);
        for (path, block) in paths.iter().zip(tree.blocks()) {
            assert_eq!(fs_err::read(path).unwrap(), block.data.as_ref());
            assert_eq!(
                path.file_name().unwrap().to_str().unwrap(),
                block.cid.to_string()
            );
        }

        // Writing again leaves the store untouched.
        let again = write_blocks(dir.path(), tree.blocks()).unwrap();
        assert_eq!(paths, again);
    }

    #[test]
    fn test_mismatching_block_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let block = Block {
            cid: Cid::for_block(Codec::Raw, b"expected"),
            data: Bytes::from_static(b"actual"),
        };
        let err = write_block(dir.path(), &block).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!block_path(dir.path(), &block.cid).exists());
    }

    #[test]
    fn test_unwritable_root_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blocks");
        fs_err::write(&root, b"not a directory").unwrap();

        let tree = address([("index.html", "<html></html>\n")]).unwrap();
        let err = write_blocks(&root, tree.blocks()).unwrap_err();
        assert!(
            err.to_string().contains(&root.display().to_string()),
            "{err}"
        );
    }
}
