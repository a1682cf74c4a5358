use std::collections::HashSet;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors raised while loading the feed-list document.
///
/// Any of these invalidates the manifest as a whole; there is no partial
/// recovery of the feeds that did parse.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("manifest has no root element")]
    MissingRoot,

    #[error("expected <feeds> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("manifest ends before </feeds>")]
    Unclosed,

    /// `position` is 1-based, counted over `<feed>` elements.
    #[error("feed #{position} is missing required attribute `{attribute}`")]
    MissingAttribute {
        position: usize,
        attribute: &'static str,
    },

    #[error("output file `{0}` is used by more than one feed")]
    DuplicateOutput(String),
}

/// One `<feed>` entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    /// Where the RSS document is fetched from
    pub url: String,
    /// Label used on the index page
    pub name: String,
    /// Filename of the rendered page, taken from the `file` attribute
    pub output_id: String,
}

/// The parsed feed list: a collection title plus feeds in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub title: String,
    pub feeds: Vec<FeedDescriptor>,
}

impl Manifest {
    /// Parse a `<feeds title="..."><feed url="..." name="..." file="..."/></feeds>` document.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let content = std::str::from_utf8(bytes)?;
        let mut reader = Reader::from_str(content);

        let mut title = None;
        let mut feeds = Vec::new();
        let mut depth: usize = 0;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if depth == 0 {
                        title = Some(root_title(&e, &reader)?);
                    } else if depth == 1 && e.name().as_ref() == b"feed" {
                        feeds.push(feed_descriptor(&e, &reader, feeds.len() + 1)?);
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        title = Some(root_title(&e, &reader)?);
                        break;
                    }
                    if depth == 1 && e.name().as_ref() == b"feed" {
                        feeds.push(feed_descriptor(&e, &reader, feeds.len() + 1)?);
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                Event::Eof => {
                    if title.is_none() {
                        return Err(ManifestError::MissingRoot);
                    }
                    return Err(ManifestError::Unclosed);
                }
                _ => {}
            }
        }

        let mut seen = HashSet::new();
        for feed in &feeds {
            if !seen.insert(feed.output_id.as_str()) {
                return Err(ManifestError::DuplicateOutput(feed.output_id.clone()));
            }
        }

        Ok(Self {
            title: title.unwrap_or_default(),
            feeds,
        })
    }
}

fn root_title(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<String, ManifestError> {
    if e.name().as_ref() != b"feeds" {
        return Err(ManifestError::UnexpectedRoot(
            String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        ));
    }

    let mut title = String::new();
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"title" {
            title = attr.decode_and_unescape_value(reader.decoder())?.into_owned();
        }
    }
    Ok(title)
}

fn feed_descriptor(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    position: usize,
) -> Result<FeedDescriptor, ManifestError> {
    let mut url = None;
    let mut name = None;
    let mut file = None;

    for attr in e.attributes() {
        let attr = attr?;
        let slot = match attr.key.as_ref() {
            b"url" => &mut url,
            b"name" => &mut name,
            b"file" => &mut file,
            _ => continue,
        };
        *slot = Some(attr.decode_and_unescape_value(reader.decoder())?.into_owned());
    }

    let require = |value: Option<String>, attribute: &'static str| {
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or(ManifestError::MissingAttribute {
                position,
                attribute,
            })
    };

    Ok(FeedDescriptor {
        url: require(url, "url")?,
        name: require(name, "name")?,
        output_id: require(file, "file")?,
    })
}
