//! The MIME part tree.
//!
//! A [`Part`] is an immutable node built once by a parser (see
//! [`crate::parser::mime`]) or by hand, and only read afterwards by the
//! renderer. Every part carries a MIME type; the renderer treats an empty
//! type as a broken parser contract and panics.

use super::message::MessageHeader;

/// Where the bytes of a single part live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Bytes held in memory alongside the part (already transfer-decoded).
    Local(Vec<u8>),
    /// Bytes held by a remote store and obtained through a
    /// [`DataProvider`](crate::render::callback::DataProvider).
    Remote {
        /// Size announced by the store, in bytes.
        size: u64,
    },
}

impl Content {
    /// Size in bytes, known or announced.
    pub fn size(&self) -> u64 {
        match self {
            Self::Local(bytes) => bytes.len() as u64,
            Self::Remote { size } => *size,
        }
    }
}

/// A leaf part carrying content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePart {
    /// IMAP-style section number, see [`Part::assign_part_ids`].
    pub part_id: String,
    /// MIME type as found in the message (e.g. `"text/plain"`).
    pub mime_type: String,
    /// Declared charset parameter.
    pub charset: Option<String>,
    /// Filename from `Content-Disposition` or `Content-Type; name=`.
    pub filename: Option<String>,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// Explicit `Content-Disposition: attachment`.
    pub is_attachment: bool,
    /// Marked for inline display (e.g. an image referenced from the body).
    pub is_inline_attachment: bool,
    /// The bytes, or a reference to them.
    pub content: Content,
}

impl SinglePart {
    /// Create a part with the given type and content and no other metadata.
    pub fn new(mime_type: impl Into<String>, content: Content) -> Self {
        Self {
            part_id: String::new(),
            mime_type: mime_type.into(),
            charset: None,
            filename: None,
            content_id: None,
            is_attachment: false,
            is_inline_attachment: false,
            content,
        }
    }

    /// A local `text/plain; charset=utf-8` part.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new("text/plain", Content::Local(body.into().into_bytes())).with_charset("utf-8")
    }

    /// A local `text/html; charset=utf-8` part.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new("text/html", Content::Local(body.into().into_bytes())).with_charset("utf-8")
    }

    /// A remote part whose bytes must be fetched.
    pub fn remote(mime_type: impl Into<String>, size: u64) -> Self {
        Self::new(mime_type, Content::Remote { size })
    }

    pub fn with_part_id(mut self, part_id: impl Into<String>) -> Self {
        self.part_id = part_id.into();
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Mark as `Content-Disposition: attachment`.
    pub fn attachment(mut self) -> Self {
        self.is_attachment = true;
        self
    }

    /// Mark as an inline attachment.
    pub fn inline(mut self) -> Self {
        self.is_inline_attachment = true;
        self
    }

    /// Whether the bytes must come from a data provider.
    pub fn is_remote(&self) -> bool {
        matches!(self.content, Content::Remote { .. })
    }
}

/// An embedded `message/rfc822` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    pub part_id: String,
    pub mime_type: String,
    /// Header of the embedded message.
    pub header: MessageHeader,
    /// Root content node of the embedded message.
    pub main_part: Box<Part>,
}

impl MessagePart {
    pub fn new(header: MessageHeader, main_part: Part) -> Self {
        Self {
            part_id: String::new(),
            mime_type: "message/rfc822".to_string(),
            header,
            main_part: Box::new(main_part),
        }
    }
}

/// The multipart flavors the renderer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartKind {
    /// `multipart/mixed` and every subtype without a dedicated meaning.
    Mixed,
    /// `multipart/signed`: content followed by its signature.
    Signed,
    /// `multipart/related`: a root body plus resources referenced by content-id.
    Related,
    /// `multipart/alternative`: equivalent representations, one is shown.
    Alternative,
}

impl MultipartKind {
    /// Map a `multipart/*` subtype to its kind.
    pub fn from_subtype(subtype: &str) -> Self {
        match subtype.to_ascii_lowercase().as_str() {
            "alternative" => Self::Alternative,
            "related" => Self::Related,
            "signed" => Self::Signed,
            _ => Self::Mixed,
        }
    }

    /// The canonical MIME type for this kind.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mixed => "multipart/mixed",
            Self::Signed => "multipart/signed",
            Self::Related => "multipart/related",
            Self::Alternative => "multipart/alternative",
        }
    }
}

/// A container part with ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    pub part_id: String,
    pub mime_type: String,
    pub kind: MultipartKind,
    pub parts: Vec<Part>,
}

impl Multipart {
    pub fn new(kind: MultipartKind, parts: Vec<Part>) -> Self {
        Self {
            part_id: String::new(),
            mime_type: kind.mime_type().to_string(),
            kind,
            parts,
        }
    }
}

/// One node of a message's content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Single(SinglePart),
    Message(MessagePart),
    Multipart(Multipart),
}

impl From<SinglePart> for Part {
    fn from(part: SinglePart) -> Self {
        Self::Single(part)
    }
}

impl From<MessagePart> for Part {
    fn from(part: MessagePart) -> Self {
        Self::Message(part)
    }
}

impl From<Multipart> for Part {
    fn from(part: Multipart) -> Self {
        Self::Multipart(part)
    }
}

impl Part {
    pub fn mixed(parts: Vec<Part>) -> Self {
        Multipart::new(MultipartKind::Mixed, parts).into()
    }

    pub fn signed(parts: Vec<Part>) -> Self {
        Multipart::new(MultipartKind::Signed, parts).into()
    }

    pub fn related(parts: Vec<Part>) -> Self {
        Multipart::new(MultipartKind::Related, parts).into()
    }

    pub fn alternative(parts: Vec<Part>) -> Self {
        Multipart::new(MultipartKind::Alternative, parts).into()
    }

    pub fn message(header: MessageHeader, main_part: Part) -> Self {
        MessagePart::new(header, main_part).into()
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Self::Single(p) => &p.mime_type,
            Self::Message(p) => &p.mime_type,
            Self::Multipart(p) => &p.mime_type,
        }
    }

    pub fn part_id(&self) -> &str {
        match self {
            Self::Single(p) => &p.part_id,
            Self::Message(p) => &p.part_id,
            Self::Multipart(p) => &p.part_id,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Single(p) => p.filename.as_deref(),
            _ => None,
        }
    }

    pub fn content_id(&self) -> Option<&str> {
        match self {
            Self::Single(p) => p.content_id.as_deref(),
            _ => None,
        }
    }

    pub fn charset(&self) -> Option<&str> {
        match self {
            Self::Single(p) => p.charset.as_deref(),
            _ => None,
        }
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self, Self::Single(p) if p.is_attachment)
    }

    pub fn is_inline_attachment(&self) -> bool {
        matches!(self, Self::Single(p) if p.is_inline_attachment)
    }

    /// Direct children: the parts of a multipart, the main part of a message.
    pub fn children(&self) -> Vec<&Part> {
        match self {
            Self::Single(_) => Vec::new(),
            Self::Message(p) => vec![p.main_part.as_ref()],
            Self::Multipart(p) => p.parts.iter().collect(),
        }
    }

    /// Depth-first search for the part carrying `Content-ID: <content_id>`.
    ///
    /// Angle brackets around `content_id` are ignored, so both `cid:` URL
    /// payloads and raw header values can be passed.
    pub fn part_for_content_id(&self, content_id: &str) -> Option<&Part> {
        let wanted = content_id.trim_start_matches('<').trim_end_matches('>');
        if self.content_id() == Some(wanted) {
            return Some(self);
        }
        self.children()
            .into_iter()
            .find_map(|child| child.part_for_content_id(wanted))
    }

    /// Depth-first search by part id.
    pub fn part_for_part_id(&self, part_id: &str) -> Option<&Part> {
        if self.part_id() == part_id {
            return Some(self);
        }
        self.children()
            .into_iter()
            .find_map(|child| child.part_for_part_id(part_id))
    }

    /// Number the tree with IMAP section numbers.
    ///
    /// Children of a container are numbered `1..n` under the container's
    /// prefix. A container that is the body of a message is addressed as
    /// `TEXT` (`2.TEXT` inside message part `2`); a single body is `1`.
    pub fn assign_part_ids(&mut self) {
        self.number_as_body("");
    }

    fn number_as_body(&mut self, prefix: &str) {
        match self {
            Self::Multipart(_) => {
                let id = format!("{prefix}TEXT");
                self.number_children(prefix);
                self.set_part_id(id);
            }
            _ => self.number(format!("{prefix}1")),
        }
    }

    fn number(&mut self, id: String) {
        match self {
            Self::Single(p) => p.part_id = id,
            Self::Message(p) => {
                p.main_part.number_as_body(&format!("{id}."));
                p.part_id = id;
            }
            Self::Multipart(_) => {
                self.number_children(&format!("{id}."));
                self.set_part_id(id);
            }
        }
    }

    fn number_children(&mut self, prefix: &str) {
        if let Self::Multipart(p) = self {
            for (index, child) in p.parts.iter_mut().enumerate() {
                child.number(format!("{prefix}{}", index + 1));
            }
        }
    }

    fn set_part_id(&mut self, id: String) {
        match self {
            Self::Single(p) => p.part_id = id,
            Self::Message(p) => p.part_id = id,
            Self::Multipart(p) => p.part_id = id,
        }
    }
}
