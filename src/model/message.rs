//! Message sources and their headers.

use chrono::{DateTime, Utc};

use super::part::{MessagePart, Part};

/// The few header fields the renderer hands to templates.
///
/// Values are already decoded (RFC 2047 encoded-words resolved) by the
/// parser that built the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MessageHeader {
    pub subject: Option<String>,
    /// Sender formatted for display (`Name <address>`).
    pub from: Option<String>,
    /// Primary recipients formatted for display.
    pub to: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
}

/// A message parsed from raw RFC 822 bytes held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub header: MessageHeader,
    pub main_part: Part,
    /// Size of the raw message in bytes.
    pub raw_size: u64,
}

/// A message whose part bodies live in a remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    /// Folder (mailbox) the message belongs to; passed to data providers.
    pub folder: String,
    pub uid: u32,
    pub header: MessageHeader,
    pub main_part: Part,
}

/// Every kind of message the renderer accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Parsed(ParsedMessage),
    Remote(RemoteMessage),
    /// A `message/rfc822` part rendered on its own.
    Embedded(MessagePart),
}

impl Message {
    /// Root content node.
    pub fn main_part(&self) -> &Part {
        match self {
            Self::Parsed(m) => &m.main_part,
            Self::Remote(m) => &m.main_part,
            Self::Embedded(m) => &m.main_part,
        }
    }

    pub fn header(&self) -> &MessageHeader {
        match self {
            Self::Parsed(m) => &m.header,
            Self::Remote(m) => &m.header,
            Self::Embedded(m) => &m.header,
        }
    }

    /// Folder handed to data providers; only remote messages have one.
    pub fn folder(&self) -> Option<&str> {
        match self {
            Self::Remote(m) => Some(&m.folder),
            Self::Parsed(_) | Self::Embedded(_) => None,
        }
    }
}

impl From<ParsedMessage> for Message {
    fn from(message: ParsedMessage) -> Self {
        Self::Parsed(message)
    }
}

impl From<RemoteMessage> for Message {
    fn from(message: RemoteMessage) -> Self {
        Self::Remote(message)
    }
}

impl From<MessagePart> for Message {
    fn from(part: MessagePart) -> Self {
        Self::Embedded(part)
    }
}
