//! Collaborators consulted during a render: where bytes come from and
//! which templates wrap each fragment.

use humansize::{format_size, BINARY};

use crate::model::message::{Message, MessageHeader};
use crate::model::part::{MessagePart, Part, SinglePart};

use super::template::{TemplateValue, TemplateValues};

/// Supplies the bytes of parts whose content is not held locally.
///
/// Called at most once per remote single part per render, and only during
/// the render pass. `None` (or empty bytes) is a legitimate answer: the part
/// then renders as nothing.
pub trait DataProvider {
    fn bytes(&mut self, folder: Option<&str>, part: &SinglePart) -> Option<Vec<u8>>;
}

impl<F> DataProvider for F
where
    F: FnMut(Option<&str>, &SinglePart) -> Option<Vec<u8>>,
{
    fn bytes(&mut self, folder: Option<&str>, part: &SinglePart) -> Option<Vec<u8>> {
        self(folder, part)
    }
}

/// A provider that never has bytes. Used when every part is local.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoData;

impl DataProvider for NoData {
    fn bytes(&mut self, _folder: Option<&str>, _part: &SinglePart) -> Option<Vec<u8>> {
        None
    }
}

/// Records every part it is asked for and answers with empty bytes.
#[derive(Debug, Default)]
pub struct RecordingDataProvider {
    requested: Vec<Part>,
}

impl RecordingDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parts asked for so far, in request order.
    pub fn requested(&self) -> &[Part] {
        &self.requested
    }

    pub fn into_requested(self) -> Vec<Part> {
        self.requested
    }
}

impl DataProvider for RecordingDataProvider {
    fn bytes(&mut self, _folder: Option<&str>, part: &SinglePart) -> Option<Vec<u8>> {
        self.requested.push(Part::Single(part.clone()));
        Some(Vec::new())
    }
}

/// Supplies templates and template values, and learns the rendering mode.
///
/// Every method has a default; the defaults render text parts verbatim and
/// attachments as nothing.
pub trait TemplateCallback {
    /// Called once per render, before the render pass, with `true` when an
    /// attachment precedes text somewhere in the message.
    fn set_mixed_text_and_attachments_mode(&mut self, _enabled: bool) {}

    /// Wraps the whole rendered message. `BODY` holds the content and
    /// `HEADER` the header section.
    fn template_for_message(&self, _message: &Message) -> String {
        "{{BODY}}".to_string()
    }

    /// Wraps an embedded `message/rfc822` part. Same values as the message template.
    fn template_for_embedded_message(&self, _part: &MessagePart) -> String {
        "{{BODY}}".to_string()
    }

    /// Wraps a rendered text part. `TEXT` holds the decoded text.
    fn template_for_text_part(&self, _part: &SinglePart) -> String {
        "{{TEXT}}".to_string()
    }

    /// Renders an attachment.
    fn template_for_attachment(&self, _part: &SinglePart) -> String {
        String::new()
    }

    /// Rendered before the first attachment that follows text.
    fn template_for_attachment_separator(&self) -> String {
        String::new()
    }

    fn template_values_for_part(&self, part: &SinglePart) -> TemplateValues {
        default_values_for_part(part)
    }

    fn template_values_for_header(&self, header: &MessageHeader) -> TemplateValues {
        default_values_for_header(header)
    }

    /// Last chance to rewrite decoded text before it is templated.
    fn filter_text_for_part(&self, text: String) -> String {
        text
    }
}

/// The template callback with every default in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTemplates;

impl TemplateCallback for DefaultTemplates {}

/// `PARTID`, `MIMETYPE`, `SIZE` (human readable), `FILENAME` and `CONTENTID`
/// when present, and an empty `IS_INLINE` section for inline attachments.
pub fn default_values_for_part(part: &SinglePart) -> TemplateValues {
    let mut values = TemplateValues::new();
    values.insert("PARTID".into(), part.part_id.clone().into());
    values.insert("MIMETYPE".into(), part.mime_type.to_ascii_lowercase().into());
    values.insert(
        "SIZE".into(),
        format_size(part.content.size(), BINARY).into(),
    );
    if let Some(filename) = &part.filename {
        values.insert("FILENAME".into(), filename.clone().into());
    }
    if let Some(content_id) = &part.content_id {
        values.insert("CONTENTID".into(), content_id.clone().into());
    }
    if part.is_inline_attachment {
        values.insert("IS_INLINE".into(), TemplateValue::Section(TemplateValues::new()));
    }
    values
}

/// `SUBJECT`, `FROM`, `TO` (comma separated), `DATE` (RFC 2822) and
/// `MESSAGEID`, each only when present.
pub fn default_values_for_header(header: &MessageHeader) -> TemplateValues {
    let mut values = TemplateValues::new();
    if let Some(subject) = &header.subject {
        values.insert("SUBJECT".into(), subject.clone().into());
    }
    if let Some(from) = &header.from {
        values.insert("FROM".into(), from.clone().into());
    }
    if !header.to.is_empty() {
        values.insert("TO".into(), header.to.join(", ").into());
    }
    if let Some(date) = &header.date {
        values.insert("DATE".into(), date.to_rfc2822().into());
    }
    if let Some(message_id) = &header.message_id {
        values.insert("MESSAGEID".into(), message_id.clone().into());
    }
    values
}
