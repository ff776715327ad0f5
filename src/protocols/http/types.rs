//! HTTP protocol types
//!
//! Vocabulary shared by the section model, the framing classifier and the
//! detection decision.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FramewatchError;

/// Which endpoint produced a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Client,
    Server,
}

impl SourceId {
    pub fn index(self) -> usize {
        match self {
            SourceId::Client => 0,
            SourceId::Server => 1,
        }
    }

    /// Section type that starts the next message from this side
    pub fn new_message(self) -> ExpectedSection {
        match self {
            SourceId::Client => ExpectedSection::NewMessageClient,
            SourceId::Server => ExpectedSection::NewMessageServer,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Client => write!(f, "client"),
            SourceId::Server => write!(f, "server"),
        }
    }
}

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Connect,
    Trace,
    Unknown,
}

impl From<&str> for HttpMethod {
    fn from(s: &str) -> Self {
        // Methods are case-sensitive tokens
        match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            "CONNECT" => Self::Connect,
            "TRACE" => Self::Trace,
            _ => Self::Unknown,
        }
    }
}

/// Header field kinds the inspector distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeaderId {
    ContentLength,
    TransferEncoding,
    Host,
    Connection,
    ContentType,
    UserAgent,
    Other,
}

impl HeaderId {
    /// Map a field name, case-insensitively
    pub fn from_name(name: &str) -> Self {
        const NAMES: &[(&str, HeaderId)] = &[
            ("content-length", HeaderId::ContentLength),
            ("transfer-encoding", HeaderId::TransferEncoding),
            ("host", HeaderId::Host),
            ("connection", HeaderId::Connection),
            ("content-type", HeaderId::ContentType),
            ("user-agent", HeaderId::UserAgent),
        ];
        let name = name.trim();
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
            .unwrap_or(HeaderId::Other)
    }
}

/// What the reassembler should expect next from one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedSection {
    /// Request line of a new client message
    NewMessageClient,
    /// Status line of a new server message
    NewMessageServer,
    /// Body delimited by Content-Length
    FixedBody,
    /// Chunk-encoded body
    ChunkedBody,
    /// Framing lost to a disaster infraction
    Aborted,
    /// Transport closed
    Closed,
}

impl ExpectedSection {
    pub fn is_body(self) -> bool {
        matches!(self, Self::FixedBody | Self::ChunkedBody)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Closed)
    }
}

impl std::fmt::Display for ExpectedSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NewMessageClient => "request",
            Self::NewMessageServer => "status",
            Self::FixedBody => "body",
            Self::ChunkedBody => "chunk",
            Self::Aborted => "abort",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a header section is handed to detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "disposition")]
pub enum DetectionDisposition {
    /// Nothing worth inspecting
    Ignore,
    /// Inspect the header section on its own
    Inspect,
    /// Inspect header and the already buffered body together
    Aggregate { body_octets: u64 },
}

/// Irregularities recorded upstream by the header tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Infraction {
    MultipleContentLength = 0,
    BadContentLength = 1,
    BadTransferEncoding = 2,
    HeaderFolding = 3,
    BareLineFeed = 4,
    MalformedHeaderLine = 5,
    TooManyHeaders = 6,
    TruncatedHeaders = 7,
    BadStatusLine = 8,
}

impl Infraction {
    pub const ALL: [Infraction; 9] = [
        Infraction::MultipleContentLength,
        Infraction::BadContentLength,
        Infraction::BadTransferEncoding,
        Infraction::HeaderFolding,
        Infraction::BareLineFeed,
        Infraction::MalformedHeaderLine,
        Infraction::TooManyHeaders,
        Infraction::TruncatedHeaders,
        Infraction::BadStatusLine,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Infraction::MultipleContentLength => "multiple_content_length",
            Infraction::BadContentLength => "bad_content_length",
            Infraction::BadTransferEncoding => "bad_transfer_encoding",
            Infraction::HeaderFolding => "header_folding",
            Infraction::BareLineFeed => "bare_line_feed",
            Infraction::MalformedHeaderLine => "malformed_header_line",
            Infraction::TooManyHeaders => "too_many_headers",
            Infraction::TruncatedHeaders => "truncated_headers",
            Infraction::BadStatusLine => "bad_status_line",
        }
    }

    fn bit(self) -> u64 {
        1 << (self as u8)
    }
}

impl FromStr for Infraction {
    type Err = FramewatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Infraction::ALL
            .iter()
            .copied()
            .find(|inf| inf.name() == s)
            .ok_or_else(|| FramewatchError::UnknownInfraction(s.to_string()))
    }
}

/// Set of infractions, stored as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Infractions(u64);

impl Infractions {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, infraction: Infraction) {
        self.0 |= infraction.bit();
    }

    pub fn with(mut self, infraction: Infraction) -> Self {
        self.insert(infraction);
        self
    }

    pub fn contains(&self, infraction: Infraction) -> bool {
        self.0 & infraction.bit() != 0
    }

    /// True when any infraction is in both sets
    pub fn intersects(&self, other: Infractions) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Infraction> + '_ {
        Infraction::ALL.into_iter().filter(|inf| self.contains(*inf))
    }
}

impl FromIterator<Infraction> for Infractions {
    fn from_iter<I: IntoIterator<Item = Infraction>>(iter: I) -> Self {
        iter.into_iter().fold(Infractions::empty(), Infractions::with)
    }
}

impl TryFrom<Vec<String>> for Infractions {
    type Error = FramewatchError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names.iter().map(|n| n.parse::<Infraction>()).collect()
    }
}

impl From<Infractions> for Vec<String> {
    fn from(set: Infractions) -> Self {
        set.iter().map(|inf| inf.name().to_string()).collect()
    }
}
