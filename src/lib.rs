//! Feed Pages - static HTML pages from a list of RSS feeds
//!
//! This crate reads a feed manifest, fetches each listed RSS feed and renders
//! one table page per feed plus an index page linking to all of them.

pub mod config;
pub mod fetcher;
pub mod manifest;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod routes;
