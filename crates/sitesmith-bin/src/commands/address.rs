use std::path::PathBuf;

use anyhow::Context;
use sitesmith::cas::{address as address_tree, write_blocks};

use crate::files::read_site;

#[derive(Debug, clap::Parser)]
pub struct Opt {
    /// Directory that contains the website
    #[clap(required = true)]
    dir: PathBuf,

    /// Directory to store every block in, named by its identifier
    #[clap(short, long)]
    out: Option<PathBuf>,
}

pub fn address(opt: Opt) -> anyhow::Result<()> {
    let files = read_site(&opt.dir)?;
    let tree = address_tree(files)
        .with_context(|| format!("failed to address {}", opt.dir.display()))?;

    for block in tree.blocks() {
        println!("{} {:>8}", block.cid, block.len());
    }
    println!();
    println!("{}", tree.root());

    if let Some(out) = opt.out {
        let paths = write_blocks(&out, tree.blocks())?;
        tracing::info!("stored {} blocks in {}", paths.len(), out.display());
    }
    Ok(())
}
