//! HTML page rendering for the index and per-feed pages.
//!
//! Each page has an escaped and a verbatim template struct sharing the same
//! template file; [`Renderer`] picks one according to `escape_html`.

use askama::Template;
use thiserror::Error;

use crate::manifest::{FeedDescriptor, Manifest};
use crate::parser::Channel;

#[derive(Debug, Error)]
#[error("failed to render page `{page}`: {source}")]
pub struct RenderError {
    pub page: String,
    #[source]
    pub source: askama::Error,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    manifest: &'a Manifest,
}

#[derive(Template)]
#[template(path = "index.html", escape = "none")]
struct RawIndexTemplate<'a> {
    manifest: &'a Manifest,
}

#[derive(Template)]
#[template(path = "feed.html")]
struct FeedTemplate<'a> {
    descriptor: &'a FeedDescriptor,
    channel: &'a Channel,
}

#[derive(Template)]
#[template(path = "feed.html", escape = "none")]
struct RawFeedTemplate<'a> {
    descriptor: &'a FeedDescriptor,
    channel: &'a Channel,
}

#[derive(Template)]
#[template(path = "unavailable.html")]
struct UnavailableTemplate<'a> {
    descriptor: &'a FeedDescriptor,
    reason: &'a str,
}

#[derive(Template)]
#[template(path = "unavailable.html", escape = "none")]
struct RawUnavailableTemplate<'a> {
    descriptor: &'a FeedDescriptor,
    reason: &'a str,
}

/// Renders pages. Output depends only on the arguments, so rendering the
/// same input twice yields identical text.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    escape_html: bool,
}

impl Renderer {
    pub fn new(escape_html: bool) -> Self {
        Self { escape_html }
    }

    /// Landing page: collection title and one link per feed, in manifest order.
    pub fn index_page(&self, manifest: &Manifest) -> Result<String, RenderError> {
        let html = if self.escape_html {
            IndexTemplate { manifest }.render()
        } else {
            RawIndexTemplate { manifest }.render()
        };
        html.map_err(|source| RenderError {
            page: "index".to_string(),
            source,
        })
    }

    /// Page for one feed: channel banner followed by an item table.
    ///
    /// The document title is the descriptor's output identifier, and every
    /// Source cell links to the descriptor's feed URL rather than the item.
    pub fn feed_page(
        &self,
        descriptor: &FeedDescriptor,
        channel: &Channel,
    ) -> Result<String, RenderError> {
        let html = if self.escape_html {
            FeedTemplate {
                descriptor,
                channel,
            }
            .render()
        } else {
            RawFeedTemplate {
                descriptor,
                channel,
            }
            .render()
        };
        html.map_err(|source| RenderError {
            page: descriptor.output_id.clone(),
            source,
        })
    }

    /// Stand-in page for a feed that could not be fetched or parsed.
    pub fn unavailable_page(
        &self,
        descriptor: &FeedDescriptor,
        reason: &str,
    ) -> Result<String, RenderError> {
        let html = if self.escape_html {
            UnavailableTemplate { descriptor, reason }.render()
        } else {
            RawUnavailableTemplate { descriptor, reason }.render()
        };
        html.map_err(|source| RenderError {
            page: descriptor.output_id.clone(),
            source,
        })
    }
}
