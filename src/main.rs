use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_pages::config::{Config, FailurePolicy, Overrides};
use feed_pages::pipeline::{index_file_name, Aggregator, ManifestSource, RunStatus};
use feed_pages::routes;

#[derive(Parser, Debug)]
#[command(
    name = "feed-pages",
    about = "Render a manifest of RSS feeds into static HTML pages"
)]
struct Cli {
    /// Manifest URL or path; prompted for when omitted
    manifest: Option<String>,

    /// Index page filename (".html" is appended if missing); prompted for when omitted
    #[arg(long, value_name = "NAME")]
    index: Option<String>,

    #[arg(long, value_name = "FILE", default_value = "feedpages.toml")]
    config: PathBuf,

    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    #[arg(long, value_enum)]
    policy: Option<FailurePolicy>,

    /// Insert feed text into pages without HTML escaping
    #[arg(long)]
    raw_html: bool,

    /// Treat non-2xx feed responses as failures
    #[arg(long)]
    strict_status: bool,

    /// Serve the output directory on this address after a completed run
    #[arg(long, value_name = "ADDR")]
    serve: Option<SocketAddr>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            output_dir: self.output_dir.clone(),
            concurrency: self.concurrency,
            failure_policy: self.policy,
            raw_html: self.raw_html,
            strict_status: self.strict_status,
        }
    }
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim();
    if value.is_empty() {
        anyhow::bail!("no input given");
    }
    Ok(value.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_pages=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?
        .with_overrides(&cli.overrides());
    config.validate()?;

    let manifest = match &cli.manifest {
        Some(manifest) => manifest.clone(),
        None => prompt("Enter URL to feeds: ")?,
    };
    let index = match &cli.index {
        Some(index) => index.clone(),
        None => prompt("Enter the name of the index file: ")?,
    };
    let index = index_file_name(&index);

    let aggregator = Aggregator::new(config)?;
    let report = aggregator
        .run(&ManifestSource::parse(&manifest), &index)
        .await?;

    if report.status == RunStatus::Aborted {
        anyhow::bail!(
            "run aborted after {} of {} feeds",
            report.rendered(),
            report.feeds.len()
        );
    }
    info!("Index written to {}", report.index.display());

    if let Some(addr) = cli.serve {
        routes::serve(aggregator.output().root(), &index, addr).await?;
    }

    Ok(())
}
