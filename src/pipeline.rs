//! Run orchestration: manifest, index page, then one fetch/parse/render pass per feed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{Config, FailurePolicy};
use crate::fetcher::{FetchError, Fetcher};
use crate::manifest::{FeedDescriptor, Manifest, ManifestError};
use crate::output::{OutputDir, WriteError};
use crate::parser::{parse_feed, ParseError};
use crate::render::{RenderError, Renderer};

/// Failures that end the run before any per-feed work can be reported.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch manifest: {0}")]
    ManifestFetch(#[from] FetchError),

    #[error("failed to read manifest {}: {source}", .path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Failure while processing a single feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to parse feed: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl FeedError {
    /// Render and write failures end the run whatever the failure policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::Render(_) | FeedError::Write(_))
    }
}

/// Where the manifest document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Url(String),
    Path(PathBuf),
}

impl ManifestSource {
    /// `http://` and `https://` inputs are URLs, anything else a local path.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("http://") || input.starts_with("https://") {
            ManifestSource::Url(input.to_string())
        } else {
            ManifestSource::Path(PathBuf::from(input))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Rendered { items: usize },
    Placeholder { reason: String },
    Skipped { reason: String },
    Failed { reason: String },
    /// The run was aborted before this feed started
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    pub output_id: String,
    pub outcome: FeedOutcome,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub index: PathBuf,
    /// One entry per manifest feed, in manifest order
    pub feeds: Vec<FeedReport>,
}

impl RunReport {
    pub fn rendered(&self) -> usize {
        self.feeds
            .iter()
            .filter(|f| matches!(f.outcome, FeedOutcome::Rendered { .. }))
            .count()
    }
}

pub struct Aggregator {
    config: Config,
    fetcher: Fetcher,
    renderer: Renderer,
    output: OutputDir,
}

impl Aggregator {
    pub fn new(config: Config) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(&config)?;
        let renderer = Renderer::new(config.escape_html);
        let output = OutputDir::new(config.output_dir.clone());

        Ok(Self {
            config,
            fetcher,
            renderer,
            output,
        })
    }

    pub fn output(&self) -> &OutputDir {
        &self.output
    }

    pub async fn load_manifest(&self, source: &ManifestSource) -> Result<Manifest, PipelineError> {
        let bytes = match source {
            ManifestSource::Url(url) => self.fetcher.fetch(url).await?,
            ManifestSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| PipelineError::ManifestRead {
                        path: path.clone(),
                        source,
                    })?
            }
        };

        let manifest = Manifest::parse(&bytes)?;
        info!(
            "Loaded manifest '{}' with {} feeds",
            manifest.title,
            manifest.feeds.len()
        );
        Ok(manifest)
    }

    pub async fn write_index(
        &self,
        manifest: &Manifest,
        index_name: &str,
    ) -> Result<PathBuf, PipelineError> {
        if manifest.feeds.iter().any(|f| f.output_id == index_name) {
            warn!(
                index = %index_name,
                "Index filename is also a feed page; the feed page will replace it"
            );
        }

        let html = self.renderer.index_page(manifest)?;
        let path = self.output.write_page(index_name, &html).await?;
        Ok(path)
    }

    /// Fetch, parse and render every feed, at most `concurrency` at a time.
    ///
    /// Reports come back in manifest order. Once a feed aborts the run, feeds
    /// already in flight finish and the rest are reported `NotAttempted`.
    pub async fn process_feeds(&self, manifest: &Manifest) -> (RunStatus, Vec<FeedReport>) {
        let aborted = AtomicBool::new(false);
        let aborted = &aborted;

        let reports: Vec<FeedReport> = stream::iter(&manifest.feeds)
            .map(move |descriptor| async move {
                let outcome = if aborted.load(Ordering::SeqCst) {
                    FeedOutcome::NotAttempted
                } else {
                    match self.process_feed(descriptor).await {
                        Ok(items) => FeedOutcome::Rendered { items },
                        Err(e) => self.recover(descriptor, e, aborted).await,
                    }
                };
                FeedReport {
                    output_id: descriptor.output_id.clone(),
                    outcome,
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let status = if aborted.load(Ordering::SeqCst) {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };
        (status, reports)
    }

    async fn process_feed(&self, descriptor: &FeedDescriptor) -> Result<usize, FeedError> {
        let bytes = self.fetcher.fetch(&descriptor.url).await?;
        let channel = parse_feed(&bytes)?;
        let html = self.renderer.feed_page(descriptor, &channel)?;
        self.output.write_page(&descriptor.output_id, &html).await?;

        info!(
            "Rendered {} items for feed '{}'",
            channel.items.len(),
            descriptor.name
        );
        Ok(channel.items.len())
    }

    async fn recover(
        &self,
        descriptor: &FeedDescriptor,
        err: FeedError,
        aborted: &AtomicBool,
    ) -> FeedOutcome {
        let reason = err.to_string();

        let policy = if err.is_fatal() {
            FailurePolicy::Abort
        } else {
            self.config.failure_policy
        };

        match policy {
            FailurePolicy::Abort => {
                error!("Feed '{}' failed, aborting run: {}", descriptor.name, reason);
                aborted.store(true, Ordering::SeqCst);
                FeedOutcome::Failed { reason }
            }
            FailurePolicy::Skip => {
                warn!("Skipping feed '{}': {}", descriptor.name, reason);
                FeedOutcome::Skipped { reason }
            }
            FailurePolicy::Placeholder => {
                warn!(
                    "Feed '{}' unavailable, writing placeholder: {}",
                    descriptor.name, reason
                );
                match self.write_placeholder(descriptor, &reason).await {
                    Ok(()) => FeedOutcome::Placeholder { reason },
                    Err(e) => {
                        error!(
                            "Failed to write placeholder for '{}', aborting run: {}",
                            descriptor.name, e
                        );
                        aborted.store(true, Ordering::SeqCst);
                        FeedOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }
        }
    }

    async fn write_placeholder(
        &self,
        descriptor: &FeedDescriptor,
        reason: &str,
    ) -> Result<(), FeedError> {
        let html = self.renderer.unavailable_page(descriptor, reason)?;
        self.output.write_page(&descriptor.output_id, &html).await?;
        Ok(())
    }

    /// Load the manifest, write the index page, then process every feed.
    pub async fn run(
        &self,
        source: &ManifestSource,
        index_name: &str,
    ) -> Result<RunReport, PipelineError> {
        let manifest = self.load_manifest(source).await?;
        let index = self.write_index(&manifest, index_name).await?;
        let (status, feeds) = self.process_feeds(&manifest).await;

        let report = RunReport {
            status,
            index,
            feeds,
        };
        match report.status {
            RunStatus::Completed => info!(
                "Run complete: {} of {} feeds rendered",
                report.rendered(),
                report.feeds.len()
            ),
            RunStatus::Aborted => error!(
                "Run aborted: {} of {} feeds rendered",
                report.rendered(),
                report.feeds.len()
            ),
        }
        Ok(report)
    }
}

/// Normalize the index filename: `.html` is appended unless already present.
pub fn index_file_name(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(".html") {
        name.to_string()
    } else {
        format!("{}.html", name)
    }
}
