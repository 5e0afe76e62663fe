//! Two-pass walk of the part tree.
//!
//! The walk is a fold: each visit takes the [`TraversalState`] by value and
//! hands back the (possibly updated) state next to the fragment it
//! rendered. Collaborators that are only borrowed for the duration of the
//! call live in [`Env`].
//!
//! The discovery pass only moves the [`Marker`]; the render pass produces
//! text and fills the attachment collectors.

use std::borrow::Cow;

use tracing::{trace, warn};

use crate::error::{RenderError, Result};
use crate::model::part::{Content, MultipartKind, Part, SinglePart};

use super::callback::{DataProvider, TemplateCallback};
use super::charset::decode_text;
use super::html::html_to_text;
use super::mimetype::{
    is_text_part, mime_type_of, preferred_alternative, single_mime_type, TEXT_HTML, TEXT_PLAIN,
};
use super::template::{render_template, TemplateValues};
use super::RenderOptions;

/// Which walk is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Pass 0: find out whether text follows an attachment.
    Discovery,
    /// Pass 1: produce output.
    Render,
}

/// What the discovery pass has seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    None,
    HadAttachment,
    HadAttachmentThenText,
}

/// State threaded through one walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalState {
    pub pass: Pass,
    pub marker: Marker,
    /// A text part has been materialized.
    pub first_rendered: bool,
    /// An attachment has been rendered.
    pub first_attachment: bool,
    /// A text part has been reached in the render pass.
    pub has_text_part: bool,
    /// Text follows an attachment somewhere in the message.
    pub mixed_text_and_attachments: bool,
    /// Attachments seen during the render pass, when the caller wants them.
    pub attachments: Option<Vec<Part>>,
    /// Non-root children of `multipart/related`, when the caller wants them.
    pub related_attachments: Option<Vec<Part>>,
}

impl TraversalState {
    /// Fresh state for pass 0. Collectors are never installed for discovery.
    pub fn discovery() -> Self {
        Self {
            pass: Pass::Discovery,
            marker: Marker::None,
            first_rendered: false,
            first_attachment: false,
            has_text_part: false,
            mixed_text_and_attachments: false,
            attachments: None,
            related_attachments: None,
        }
    }

    /// State for pass 1, given the marker pass 0 ended with.
    pub fn render(
        marker: Marker,
        attachments: Option<Vec<Part>>,
        related_attachments: Option<Vec<Part>>,
    ) -> Self {
        Self {
            pass: Pass::Render,
            marker,
            mixed_text_and_attachments: marker == Marker::HadAttachmentThenText,
            attachments,
            related_attachments,
            ..Self::discovery()
        }
    }
}

/// Borrowed collaborators for one walk.
pub struct Env<'a> {
    /// Folder handed to the data provider.
    pub folder: Option<&'a str>,
    pub data: &'a mut dyn DataProvider,
    pub templates: &'a mut dyn TemplateCallback,
    pub options: &'a RenderOptions,
}

/// A fragment (`None` when there is nothing to render) and the state after it.
pub type Visit = (Option<String>, TraversalState);

/// Visit `part` at nesting `depth` (the main part is depth 0).
///
/// # Errors
///
/// [`RenderError::TooDeep`] when the tree nests deeper than
/// [`RenderOptions::max_depth`].
///
/// # Panics
///
/// When a part reached has an empty MIME type.
pub fn visit(part: &Part, state: TraversalState, env: &mut Env<'_>, depth: usize) -> Result<Visit> {
    if depth > env.options.max_depth {
        return Err(RenderError::TooDeep {
            limit: env.options.max_depth,
        });
    }
    let mime_type = mime_type_of(part);
    trace!(
        part_id = part.part_id(),
        mime_type = %mime_type,
        pass = ?state.pass,
        depth,
        "Visiting part"
    );

    match part {
        Part::Single(single) => Ok(visit_single(single, state, env)),
        Part::Message(message) => {
            if state.pass == Pass::Discovery {
                return Ok((None, state));
            }
            let (body, state) = visit(&message.main_part, state, env, depth + 1)?;
            let Some(body) = body else {
                return Ok((None, state));
            };
            let mut values = env.templates.template_values_for_header(&message.header);
            wrap_body(&mut values, body);
            let template = env.templates.template_for_embedded_message(message);
            Ok((
                Some(expand_or_empty(&template, &values, &message.part_id)),
                state,
            ))
        }
        Part::Multipart(multipart) => match multipart.kind {
            MultipartKind::Mixed | MultipartKind::Signed => {
                visit_mixed(&multipart.parts, state, env, depth)
            }
            MultipartKind::Related => visit_related(&multipart.parts, state, env, depth),
            MultipartKind::Alternative => match preferred_alternative(
                &multipart.parts,
                depth + 1,
                env.options.max_depth,
            )? {
                Some(child) => visit(child, state, env, depth + 1),
                None => Ok((None, state)),
            },
        },
    }
}

/// Put `body` under `BODY` and the header values under a `HEADER` section.
pub(crate) fn wrap_body(values: &mut TemplateValues, body: String) {
    let header = values.clone();
    values.insert("HEADER".into(), header.into());
    values.insert("BODY".into(), body.into());
}

fn visit_mixed(
    parts: &[Part],
    mut state: TraversalState,
    env: &mut Env<'_>,
    depth: usize,
) -> Result<Visit> {
    let mut result = String::new();
    for child in parts {
        let (fragment, next) = visit(child, state, env, depth + 1)?;
        state = next;
        if state.pass == Pass::Render {
            if let Some(fragment) = fragment {
                result.push_str(&fragment);
            }
        }
    }
    Ok((Some(result), state))
}

fn visit_related(
    parts: &[Part],
    mut state: TraversalState,
    env: &mut Env<'_>,
    depth: usize,
) -> Result<Visit> {
    let Some((root, related)) = parts.split_first() else {
        let fragment = match state.pass {
            Pass::Discovery => None,
            Pass::Render => Some(String::new()),
        };
        return Ok((fragment, state));
    };

    if let Some(collector) = state.related_attachments.as_mut() {
        collector.extend(related.iter().cloned());
    }
    visit(root, state, env, depth + 1)
}

fn visit_single(part: &SinglePart, mut state: TraversalState, env: &mut Env<'_>) -> Visit {
    let mime_type = single_mime_type(part);

    if !is_text_part(part, state.first_rendered) {
        return visit_attachment(part, state, env);
    }

    if state.pass == Pass::Discovery {
        if state.marker == Marker::HadAttachment {
            state.marker = Marker::HadAttachmentThenText;
        }
        return (None, state);
    }

    state.has_text_part = true;

    let is_html = mime_type == TEXT_HTML;
    if mime_type != TEXT_PLAIN && !(is_html && env.options.html_to_text) {
        return (None, state);
    }

    let bytes: Option<Cow<'_, [u8]>> = match &part.content {
        Content::Local(bytes) => Some(Cow::Borrowed(bytes.as_slice())),
        Content::Remote { .. } => env.data.bytes(env.folder, part).map(Cow::Owned),
    };
    let Some(bytes) = bytes else {
        trace!(part_id = %part.part_id, "No bytes available for part");
        return (None, state);
    };

    let mut text = decode_text(&bytes, part.charset.as_deref());
    if is_html {
        text = html_to_text(&text);
    }
    let text = env.templates.filter_text_for_part(text);
    state.first_rendered = true;

    let mut values = env.templates.template_values_for_part(part);
    values.insert("TEXT".into(), text.into());
    let template = env.templates.template_for_text_part(part);
    (Some(expand_or_empty(&template, &values, &part.part_id)), state)
}

fn visit_attachment(part: &SinglePart, mut state: TraversalState, env: &mut Env<'_>) -> Visit {
    if state.pass == Pass::Discovery {
        if state.marker == Marker::None {
            state.marker = Marker::HadAttachment;
        }
        return (None, state);
    }

    if let Some(collector) = state.attachments.as_mut() {
        collector.push(Part::Single(part.clone()));
    }

    let values = env.templates.template_values_for_part(part);
    let mut rendered = String::new();
    if !state.first_attachment && state.has_text_part {
        let separator = env.templates.template_for_attachment_separator();
        rendered.push_str(&expand_or_empty(&separator, &values, &part.part_id));
    }
    let template = env.templates.template_for_attachment(part);
    rendered.push_str(&expand_or_empty(&template, &values, &part.part_id));
    state.first_attachment = true;

    (Some(rendered), state)
}

/// Expand a template; a broken template renders as nothing.
pub(crate) fn expand_or_empty(template: &str, values: &TemplateValues, part_id: &str) -> String {
    if template.is_empty() {
        return String::new();
    }
    match render_template(template, values) {
        Ok(text) => text,
        Err(e) => {
            warn!(part_id, error = %e, "Template expansion failed, rendering nothing");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::MessageHeader;
    use crate::model::part::{MessagePart, Multipart};
    use crate::render::callback::{DefaultTemplates, NoData, RecordingDataProvider};

    fn pdf() -> Part {
        SinglePart::new("application/pdf", Content::Local(vec![1, 2, 3]))
            .with_filename("doc.pdf")
            .attachment()
            .into()
    }

    fn discover(part: &Part) -> TraversalState {
        let options = RenderOptions::default();
        let mut data = NoData;
        let mut templates = DefaultTemplates;
        let mut env = Env {
            folder: None,
            data: &mut data,
            templates: &mut templates,
            options: &options,
        };
        visit(part, TraversalState::discovery(), &mut env, 0).unwrap().1
    }

    fn render_pass(part: &Part, state: TraversalState) -> Visit {
        let options = RenderOptions::default();
        let mut data = NoData;
        let mut templates = DefaultTemplates;
        let mut env = Env {
            folder: None,
            data: &mut data,
            templates: &mut templates,
            options: &options,
        };
        visit(part, state, &mut env, 0).unwrap()
    }

    #[test]
    fn test_discovery_attachment_then_text() {
        let tree = Part::mixed(vec![pdf(), SinglePart::text("after").into()]);
        assert_eq!(discover(&tree).marker, Marker::HadAttachmentThenText);
    }

    #[test]
    fn test_discovery_text_then_attachment() {
        let tree = Part::mixed(vec![SinglePart::text("before").into(), pdf()]);
        assert_eq!(discover(&tree).marker, Marker::HadAttachment);
    }

    #[test]
    fn test_discovery_text_only() {
        let tree = Part::mixed(vec![SinglePart::text("a").into()]);
        assert_eq!(discover(&tree).marker, Marker::None);
    }

    #[test]
    fn test_discovery_does_not_enter_messages() {
        let tree = Part::mixed(vec![
            pdf(),
            Part::message(MessageHeader::default(), SinglePart::text("inner").into()),
        ]);
        assert_eq!(discover(&tree).marker, Marker::HadAttachment);
    }

    #[test]
    fn test_discovery_renders_nothing() {
        let tree = Part::mixed(vec![SinglePart::text("a").into(), pdf()]);
        let options = RenderOptions::default();
        let mut data = RecordingDataProvider::new();
        let mut templates = DefaultTemplates;
        let mut env = Env {
            folder: None,
            data: &mut data,
            templates: &mut templates,
            options: &options,
        };
        let (fragment, state) = visit(&tree, TraversalState::discovery(), &mut env, 0).unwrap();
        assert_eq!(fragment, Some(String::new()));
        assert!(state.attachments.is_none());
        assert!(data.requested().is_empty());
    }

    #[test]
    fn test_render_pass_collects_attachments() {
        let tree = Part::mixed(vec![SinglePart::text("body").into(), pdf()]);
        let state = TraversalState::render(Marker::HadAttachment, Some(Vec::new()), None);
        let (fragment, state) = render_pass(&tree, state);
        assert_eq!(fragment.as_deref(), Some("body"));
        assert_eq!(state.attachments.map(|a| a.len()), Some(1));
        assert!(state.first_rendered);
        assert!(state.first_attachment);
        assert!(!state.mixed_text_and_attachments);
    }

    #[test]
    fn test_render_state_carries_mixed_flag() {
        let state = TraversalState::render(Marker::HadAttachmentThenText, None, None);
        assert!(state.mixed_text_and_attachments);
        assert_eq!(state.pass, Pass::Render);
    }

    #[test]
    fn test_related_empty() {
        let tree = Part::related(Vec::new());
        assert_eq!(render_pass(&tree, TraversalState::discovery()).0, None);
        let state = TraversalState::render(Marker::None, None, None);
        assert_eq!(render_pass(&tree, state).0, Some(String::new()));
    }

    #[test]
    fn test_alternative_without_plain_renders_nothing() {
        let tree = Part::alternative(vec![SinglePart::html("<b>x</b>").into()]);
        let state = TraversalState::render(Marker::None, None, None);
        assert_eq!(render_pass(&tree, state).0, None);
    }

    #[test]
    fn test_html_not_materialized_by_default() {
        let part: Part = SinglePart::html("<p>x</p>").into();
        let state = TraversalState::render(Marker::None, None, None);
        let (fragment, state) = render_pass(&part, state);
        assert_eq!(fragment, None);
        assert!(state.has_text_part);
        assert!(!state.first_rendered);
    }

    #[test]
    fn test_second_named_text_part_is_attachment() {
        let tree = Part::mixed(vec![
            SinglePart::text("body").into(),
            SinglePart::text("notes").with_filename("notes.txt").into(),
        ]);
        let state = TraversalState::render(Marker::None, Some(Vec::new()), None);
        let (fragment, state) = render_pass(&tree, state);
        assert_eq!(fragment.as_deref(), Some("body"));
        let attachments = state.attachments.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename(), Some("notes.txt"));
    }

    #[test]
    fn test_too_deep() {
        let mut tree: Part = SinglePart::text("leaf").into();
        for _ in 0..5 {
            tree = Part::mixed(vec![tree]);
        }
        let options = RenderOptions {
            max_depth: 3,
            ..Default::default()
        };
        let mut data = NoData;
        let mut templates = DefaultTemplates;
        let mut env = Env {
            folder: None,
            data: &mut data,
            templates: &mut templates,
            options: &options,
        };
        let err = visit(&tree, TraversalState::discovery(), &mut env, 0).unwrap_err();
        assert!(matches!(err, RenderError::TooDeep { limit: 3 }));
    }

    #[test]
    fn test_too_deep_under_alternative() {
        let mut chain: Part = SinglePart::html("<p>leaf</p>").into();
        for _ in 0..100_000 {
            chain = Part::mixed(vec![chain]);
        }
        let tree = Part::alternative(vec![chain]);
        let options = RenderOptions::default();
        let mut data = NoData;
        let mut templates = DefaultTemplates;
        let mut env = Env {
            folder: None,
            data: &mut data,
            templates: &mut templates,
            options: &options,
        };
        let state = TraversalState::render(Marker::None, None, None);
        let err = visit(&tree, state, &mut env, 0).unwrap_err();
        assert!(matches!(err, RenderError::TooDeep { limit: 32 }));
        // Dropping a chain this deep recurses once per level.
        std::mem::forget(tree);
    }

    #[test]
    #[should_panic(expected = "has no MIME type")]
    fn test_untyped_multipart_panics() {
        let mut multipart = Multipart::new(MultipartKind::Mixed, vec![SinglePart::text("hi").into()]);
        multipart.mime_type = String::new();
        let state = TraversalState::render(Marker::None, None, None);
        let _ = render_pass(&Part::Multipart(multipart), state);
    }

    #[test]
    #[should_panic(expected = "has no MIME type")]
    fn test_untyped_embedded_message_panics() {
        let mut message = MessagePart::new(MessageHeader::default(), SinglePart::text("hi").into());
        message.mime_type = String::new();
        let state = TraversalState::render(Marker::None, None, None);
        let _ = render_pass(&Part::Message(message), state);
    }

    #[test]
    fn test_broken_template_renders_empty() {
        let values = TemplateValues::new();
        assert_eq!(expand_or_empty("{{#OPEN}}", &values, "1"), "");
        assert_eq!(expand_or_empty("", &values, "1"), "");
    }
}
