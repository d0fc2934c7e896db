use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use console::style;
use sitesmith::{
    cas::address, config::SitesmithConfig, publish_tree, setup, static_url, LoggingDeployer,
};

use crate::{files::read_site, global_multi_progress, progress::IndicatifReporter};

#[derive(Debug, clap::Parser)]
pub struct Opt {
    /// Directory that contains the website
    #[clap(required = true)]
    dir: PathBuf,

    /// The account that serves the website
    #[clap(short, long, default_value = "web4gpt.near")]
    account: String,

    /// Only check which blocks are missing, do not upload or deploy anything
    #[clap(long)]
    dry_run: bool,
}

pub async fn publish(opt: Opt, config: &SitesmithConfig) -> anyhow::Result<()> {
    let files = read_site(&opt.dir)?;
    if files.is_empty() {
        anyhow::bail!("{} does not contain any files", opt.dir.display());
    }
    let tree = address(files).with_context(|| format!("failed to address {}", opt.dir.display()))?;
    let store = Arc::new(setup::block_store(config)?);
    let uploader = setup::uploader(config, store)
        .with_reporter(Arc::new(IndicatifReporter::new(global_multi_progress())));

    if opt.dry_run {
        let missing = uploader.missing(tree.blocks()).await?;
        for cid in &missing {
            println!("{cid}");
        }
        println!(
            "{} of {} blocks would be uploaded, root {}",
            missing.len(),
            tree.blocks().len(),
            static_url(&tree.root())
        );
        return Ok(());
    }

    let published = publish_tree(&tree, &uploader, &LoggingDeployer, &opt.account).await?;

    println!(
        "{} published {} ({} of {} blocks uploaded)",
        style("✔").green(),
        style(&published.static_url).bold(),
        published.upload.written + published.upload.already_applied,
        published.upload.total
    );
    Ok(())
}
