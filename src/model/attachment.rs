//! Attachment metadata.
//!
//! A flat, serializable summary of a part returned by the attachment
//! collectors. The content itself stays in the part (or in the store).

use super::part::Part;

/// Metadata about an email attachment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentMeta {
    /// IMAP-style section number of the part.
    pub part_id: String,

    /// Filename of the attachment. Generated if missing from the headers.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded size in bytes (announced size for remote parts).
    pub size: u64,

    /// Content-ID for inline attachments referenced from HTML.
    pub content_id: Option<String>,

    /// `true` if the attachment is inline (embedded in HTML), `false` if a regular attachment.
    pub is_inline: bool,

    /// `true` if the bytes still have to be fetched.
    pub is_remote: bool,
}

impl AttachmentMeta {
    /// Summarize a part. `index` is used to generate a name when the part has none.
    pub fn from_part(part: &Part, index: usize) -> Self {
        let filename = part
            .filename()
            .map(String::from)
            .unwrap_or_else(|| format!("attachment_{index}{}", extension_for(part.mime_type())));

        let (size, is_remote) = match part {
            Part::Single(p) => (p.content.size(), p.is_remote()),
            _ => (0, false),
        };

        Self {
            part_id: part.part_id().to_string(),
            filename,
            content_type: part.mime_type().to_ascii_lowercase(),
            size,
            content_id: part.content_id().map(String::from),
            is_inline: part.is_inline_attachment(),
            is_remote,
        }
    }

    /// Summarize a list of parts, numbering generated names by position.
    pub fn from_parts(parts: &[Part]) -> Vec<Self> {
        parts
            .iter()
            .enumerate()
            .map(|(idx, part)| Self::from_part(part, idx))
            .collect()
    }
}

/// A file extension (with the dot) for common types, empty otherwise.
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "text/plain" => ".txt",
        "text/html" => ".html",
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "application/pdf" => ".pdf",
        "message/rfc822" => ".eml",
        "text/calendar" => ".ics",
        _ => "",
    }
}
