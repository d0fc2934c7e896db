use std::{path::PathBuf, sync::Arc};

use sitesmith::{
    config::SitesmithConfig,
    setup::{self, api_key_from_env, completion_client},
};

use crate::{files::write_site, global_multi_progress, progress::StdoutListener};

#[derive(Debug, clap::Parser)]
pub struct Opt {
    /// What to build or change
    #[clap(required = true)]
    prompt: String,

    /// Directory to write the files of the website to
    #[clap(short, long, default_value = "site")]
    out: PathBuf,

    /// Wait for the whole answer instead of streaming it
    #[clap(long)]
    no_stream: bool,
}

pub async fn ask(opt: Opt, config: &SitesmithConfig) -> anyhow::Result<()> {
    let client = completion_client(config, api_key_from_env(config)?)?;
    let mut session = setup::session(config, Arc::new(client));
    if !opt.no_stream {
        session = session.with_listener(Arc::new(StdoutListener::new(global_multi_progress())));
    }
    let session = Arc::new(session);

    // Ctrl-C keeps what was received so far.
    let cancel_session = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_session.cancel();
        }
    });

    let turn = if opt.no_stream {
        let turn = session.submit_complete(&opt.prompt).await?;
        println!("{}", turn.assembled.content);
        turn
    } else {
        let turn = session.submit(&opt.prompt).await?;
        println!();
        turn
    };
    for diagnostic in &turn.extraction.diagnostics {
        tracing::warn!("{diagnostic}");
    }

    if !turn.assembled.is_cancelled() {
        let pending = session.store().pending();
        if !pending.is_empty() {
            tracing::info!("the sitemap lists {} more files", pending.len());
            session.generate_missing().await?;
        }
    }

    let pending = session.store().pending();
    if !pending.is_empty() {
        tracing::warn!("still missing: {}", pending.join(", "));
    }

    let written = write_site(&opt.out, &session.store().snapshot())?;
    tracing::info!("wrote {} files to {}", written.len(), opt.out.display());
    Ok(())
}
