use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// Returned when a string is not a `type/subtype` content type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid content type '{0}' (expected type/subtype)")]
pub struct InvalidContentType(pub String);

fn content_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9.+_-]*/[a-z0-9][a-z0-9.+_-]*$").unwrap())
}

/// MIME-like name of a data kind, e.g. `video/x-raw`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentType(String);

impl ContentType {
    pub fn parse(s: &str) -> Result<Self, InvalidContentType> {
        if content_type_re().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidContentType(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentType {
    type Err = InvalidContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentType {
    type Error = InvalidContentType;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ContentType> for String {
    fn from(ct: ContentType) -> Self {
        ct.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A plugin endpoint bound to one content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub name: ContentType,
}

impl PortDescriptor {
    pub fn new(name: ContentType) -> Self {
        Self { name }
    }
}

/// Static port declaration of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub sink: PortDescriptor,
    pub src: PortDescriptor,
}

impl Metadata {
    pub fn new(sink: ContentType, src: ContentType) -> Self {
        Self {
            sink: PortDescriptor::new(sink),
            src: PortDescriptor::new(src),
        }
    }
}

/// One opaque binary attachment, optionally keyed (e.g. "image")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    key: Option<String>,
    data: Vec<u8>,
}

impl Payload {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { key: None, data: data.into() }
    }

    pub fn keyed(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { key: Some(key.into()), data: data.into() }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Immutable record exchanged between host and plugins.
///
/// There are no mutators: plugins read their inputs and build new messages
/// with [`Message::new`] or [`Message::from_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payloads: Vec<Payload>,
    value: Map<String, Value>,
}

impl Message {
    pub fn new(payloads: Vec<Payload>, value: Map<String, Value>) -> Self {
        Self { payloads, value }
    }

    /// Message without attachments
    pub fn from_value(value: Map<String, Value>) -> Self {
        Self::new(Vec::new(), value)
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    pub fn value(&self) -> &Map<String, Value> {
        &self.value
    }
}

pub type Batch = Vec<Message>;

/// A batch plus the content type the host attributes to it
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBatch {
    pub content_type: ContentType,
    pub messages: Batch,
}

impl TypedBatch {
    pub fn new(content_type: ContentType, messages: Batch) -> Self {
        Self { content_type, messages }
    }

    pub fn empty(content_type: ContentType) -> Self {
        Self::new(content_type, Vec::new())
    }
}
