use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while parsing an RSS document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("document has no root element")]
    MissingRoot,

    #[error("expected <rss> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("document ends before </rss>")]
    Truncated,

    #[error("document has no <channel> element")]
    MissingChannel,
}

/// A single `<item>` of a channel. Every field is kept exactly as it appeared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `<pubDate>` text, empty when the item has none
    pub pub_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Channel(Field),
    Item(Field),
}

impl Field {
    fn channel(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }

    fn item(name: &[u8]) -> Option<Self> {
        match name {
            b"pubDate" => Some(Field::PubDate),
            other => Self::channel(other),
        }
    }
}

impl Channel {
    fn slot(&mut self, target: Target) -> Option<&mut String> {
        match target {
            Target::Channel(Field::Title) => Some(&mut self.title),
            Target::Channel(Field::Link) => Some(&mut self.link),
            Target::Channel(Field::Description) => Some(&mut self.description),
            Target::Channel(Field::PubDate) => None,
            Target::Item(field) => {
                let item = self.items.last_mut()?;
                Some(match field {
                    Field::Title => &mut item.title,
                    Field::Link => &mut item.link,
                    Field::Description => &mut item.description,
                    Field::PubDate => &mut item.pub_date,
                })
            }
        }
    }
}

/// Tracks where the reader is inside `<rss><channel><item>`.
///
/// Depth 1 is the root, 2 the channel's children, 3 an item's children.
#[derive(Default)]
struct Cursor {
    depth: usize,
    root_seen: bool,
    channel_seen: bool,
    in_channel: bool,
    in_item: bool,
    /// Field receiving character data, with the depth of its element
    capture: Option<(Target, usize)>,
}

impl Cursor {
    /// Works out what a start tag at the current depth refers to.
    ///
    /// Returns the field it opens, if any. Items are appended to `channel`.
    fn open(&mut self, name: &[u8], channel: &mut Channel) -> Option<Target> {
        match self.depth {
            1 if name == b"channel" => {
                self.channel_seen = true;
                self.in_channel = true;
                None
            }
            2 if self.in_channel && name == b"item" => {
                channel.items.push(Item::default());
                self.in_item = true;
                None
            }
            2 if self.in_channel => Field::channel(name).map(Target::Channel),
            3 if self.in_item => Field::item(name).map(Target::Item),
            _ => None,
        }
    }

    fn close(&mut self) {
        if matches!(self.capture, Some((_, depth)) if depth == self.depth) {
            self.capture = None;
        }
        self.depth -= 1;
        match self.depth {
            2 => self.in_item = false,
            1 => self.in_channel = false,
            _ => {}
        }
    }

    /// A self-closing `<channel/>` or `<item/>` is finished as soon as it opens.
    fn close_empty(&mut self) {
        match self.depth {
            2 => self.in_item = false,
            1 => self.in_channel = false,
            _ => {}
        }
    }

    fn capturing(&self) -> Option<Target> {
        match self.capture {
            Some((target, depth)) if depth == self.depth => Some(target),
            _ => None,
        }
    }
}

/// Parse an RSS document into its channel and items.
///
/// Only the structure needed for rendering is extracted; unknown elements
/// (including namespaced ones such as `atom:link`) are skipped. Any markup
/// error fails the whole document.
pub fn parse_feed(bytes: &[u8]) -> Result<Channel, ParseError> {
    let content = std::str::from_utf8(bytes)?;
    let mut reader = Reader::from_str(content);

    let mut channel = Channel::default();
    let mut cursor = Cursor::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if cursor.depth == 0 {
                    open_root(&e, &reader)?;
                    cursor.root_seen = true;
                    cursor.depth = 1;
                    continue;
                }
                let target = cursor.open(e.name().as_ref(), &mut channel);
                cursor.depth += 1;
                if let Some(target) = target {
                    if let Some(slot) = channel.slot(target) {
                        slot.clear();
                    }
                    cursor.capture = Some((target, cursor.depth));
                }
            }
            Event::Empty(e) => {
                if cursor.depth == 0 {
                    open_root(&e, &reader)?;
                    cursor.root_seen = true;
                    break;
                }
                if let Some(target) = cursor.open(e.name().as_ref(), &mut channel) {
                    if let Some(slot) = channel.slot(target) {
                        slot.clear();
                    }
                }
                cursor.close_empty();
            }
            Event::Text(e) => {
                if let Some(target) = cursor.capturing() {
                    let text = e.unescape()?;
                    if let Some(slot) = channel.slot(target) {
                        slot.push_str(&text);
                    }
                }
            }
            Event::CData(e) => {
                if let Some(target) = cursor.capturing() {
                    let raw = e.into_inner();
                    if let Some(slot) = channel.slot(target) {
                        slot.push_str(&String::from_utf8_lossy(&raw));
                    }
                }
            }
            Event::End(_) => {
                if cursor.depth == 0 {
                    return Err(ParseError::MissingRoot);
                }
                cursor.close();
                if cursor.depth == 0 {
                    break;
                }
            }
            Event::Eof => {
                if !cursor.root_seen {
                    return Err(ParseError::MissingRoot);
                }
                return Err(ParseError::Truncated);
            }
            _ => {}
        }
    }

    if !cursor.channel_seen {
        return Err(ParseError::MissingChannel);
    }

    debug!(
        title = %channel.title,
        items = channel.items.len(),
        "Parsed channel"
    );
    Ok(channel)
}

fn open_root(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<(), ParseError> {
    if e.name().as_ref() != b"rss" {
        return Err(ParseError::UnexpectedRoot(
            String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        ));
    }

    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"version" {
            let version = attr.decode_and_unescape_value(reader.decoder())?;
            debug!(version = %version, "RSS version");
        }
    }
    Ok(())
}
