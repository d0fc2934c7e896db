use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use indicatif::{MultiProgress, ProgressDrawTarget};
use once_cell::sync::Lazy;
use sitesmith::config::{default_config_file, SitesmithConfig};
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

mod commands;
mod files;
mod progress;
mod writer;

/// Returns a global instance of [`indicatif::MultiProgress`].
///
/// Logging is routed through [`writer::IndicatifWriter`] which suspends the bars of this instance
/// while a line is written.
pub fn global_multi_progress() -> MultiProgress {
    static GLOBAL_MP: Lazy<MultiProgress> = Lazy::new(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        mp
    });
    GLOBAL_MP.clone()
}

/// Generate static websites with a language model and publish them as content-addressed trees.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file to load. Can be given multiple times, later files take priority.
    #[arg(long, global = true)]
    config: Vec<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Ask the model to build or change a website
    Ask(commands::ask::Opt),

    /// Compute the root identifier and the blocks of a directory
    Address(commands::address::Opt),

    /// Upload a directory and deploy its root
    Publish(commands::publish::Opt),
}

fn load_config(paths: &[PathBuf]) -> anyhow::Result<SitesmithConfig> {
    let paths = if paths.is_empty() {
        default_config_file().into_iter().collect()
    } else {
        paths.to_vec()
    };
    if paths.is_empty() {
        return Ok(SitesmithConfig::default());
    }
    Ok(SitesmithConfig::load_from_files(&paths)?)
}

/// Entry point of the `sitesmith` cli.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(cli.verbose.tracing_level_filter().into())
        .from_env()?
        // the connection pool is very chatty on debug
        .add_directive("hyper_util=info".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer::IndicatifWriter::new(global_multi_progress()))
        .without_time()
        .finish()
        .try_init()?;

    let config = load_config(&cli.config)?;
    for path in &config.loaded_from {
        tracing::debug!("loaded configuration from {}", path.display());
    }

    match cli.command {
        Commands::Ask(opt) => commands::ask::ask(opt, &config).await,
        Commands::Address(opt) => commands::address::address(opt),
        Commands::Publish(opt) => commands::publish::publish(opt, &config).await,
    }
}
