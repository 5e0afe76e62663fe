//! Rendering a message's part tree to text.
//!
//! Every render walks the tree twice. The first walk only looks for an
//! attachment followed by more text; the template callback learns the
//! answer before the second walk produces output. See [`traversal`].
//!
//! The free functions use [`Renderer::default()`].

pub mod callback;
pub mod charset;
pub mod html;
pub mod mimetype;
pub mod template;
pub mod traversal;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::message::Message;
use crate::model::part::Part;

use callback::{DataProvider, DefaultTemplates, NoData, RecordingDataProvider, TemplateCallback};
use traversal::{expand_or_empty, visit, wrap_body, Env, Marker, TraversalState};

/// Default limit on part nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Knobs for a [`Renderer`]. Also the `[render]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Deepest nesting accepted before failing with `TooDeep`.
    pub max_depth: usize,
    /// Flatten selected `text/html` parts to text instead of skipping them.
    pub html_to_text: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            html_to_text: false,
        }
    }
}

/// What a full render produced, collectors included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Whether an attachment preceded text.
    pub mixed_text_and_attachments: bool,
    pub attachments: Vec<Part>,
    pub related_attachments: Vec<Part>,
}

/// Renders messages with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `message`, fetching remote bytes through `data`.
    pub fn render(
        &self,
        message: &Message,
        data: &mut dyn DataProvider,
        templates: &mut dyn TemplateCallback,
    ) -> Result<String> {
        Ok(self.render_full(message, data, templates)?.text)
    }

    /// Render a message whose parts all carry their own bytes.
    pub fn render_local(
        &self,
        message: &Message,
        templates: &mut dyn TemplateCallback,
    ) -> Result<String> {
        self.render(message, &mut NoData, templates)
    }

    /// Attachments reached while rendering, in document order.
    pub fn attachments_for(&self, message: &Message) -> Result<Vec<Part>> {
        Ok(self.dry_run(message)?.0.attachments)
    }

    /// Non-root children of every `multipart/related` reached while rendering.
    pub fn inline_attachments_for(&self, message: &Message) -> Result<Vec<Part>> {
        Ok(self.dry_run(message)?.0.related_attachments)
    }

    /// Parts whose bytes a render would ask the data provider for, in request order.
    pub fn required_parts_for_rendering(&self, message: &Message) -> Result<Vec<Part>> {
        Ok(self.dry_run(message)?.1)
    }

    /// Run the discovery pass alone.
    pub fn discover(&self, part: &Part) -> Result<Marker> {
        let mut data = NoData;
        let mut templates = DefaultTemplates;
        let mut env = Env {
            folder: None,
            data: &mut data,
            templates: &mut templates,
            options: &self.options,
        };
        let (_, state) = visit(part, TraversalState::discovery(), &mut env, 0)?;
        Ok(state.marker)
    }

    /// Render with both collectors installed.
    pub fn render_full(
        &self,
        message: &Message,
        data: &mut dyn DataProvider,
        templates: &mut dyn TemplateCallback,
    ) -> Result<Rendered> {
        let main_part = message.main_part();
        let mut env = Env {
            folder: message.folder(),
            data,
            templates,
            options: &self.options,
        };

        let (_, discovered) = visit(main_part, TraversalState::discovery(), &mut env, 0)?;
        let mixed = discovered.marker == Marker::HadAttachmentThenText;
        debug!(marker = ?discovered.marker, mixed, "Discovery pass finished");
        env.templates.set_mixed_text_and_attachments_mode(mixed);

        let state = TraversalState::render(discovered.marker, Some(Vec::new()), Some(Vec::new()));
        let (content, state) = visit(main_part, state, &mut env, 0)?;

        let mut values = env.templates.template_values_for_header(message.header());
        wrap_body(&mut values, content.unwrap_or_default());
        let template = env.templates.template_for_message(message);
        let text = expand_or_empty(&template, &values, main_part.part_id());

        let attachments = state.attachments.unwrap_or_default();
        let related_attachments = state.related_attachments.unwrap_or_default();
        debug!(
            chars = text.len(),
            attachments = attachments.len(),
            related = related_attachments.len(),
            "Render pass finished"
        );

        Ok(Rendered {
            text,
            mixed_text_and_attachments: mixed,
            attachments,
            related_attachments,
        })
    }

    fn dry_run(&self, message: &Message) -> Result<(Rendered, Vec<Part>)> {
        let mut recorder = RecordingDataProvider::new();
        let rendered = self.render_full(message, &mut recorder, &mut DefaultTemplates)?;
        Ok((rendered, recorder.into_requested()))
    }
}

/// Render `message` with default options.
pub fn render(
    message: &Message,
    data: &mut dyn DataProvider,
    templates: &mut dyn TemplateCallback,
) -> Result<String> {
    Renderer::default().render(message, data, templates)
}

/// Render a message whose parts carry their own bytes, with default options.
pub fn render_local(message: &Message, templates: &mut dyn TemplateCallback) -> Result<String> {
    Renderer::default().render_local(message, templates)
}

pub fn attachments_for(message: &Message) -> Result<Vec<Part>> {
    Renderer::default().attachments_for(message)
}

pub fn inline_attachments_for(message: &Message) -> Result<Vec<Part>> {
    Renderer::default().inline_attachments_for(message)
}

pub fn required_parts_for_rendering(message: &Message) -> Result<Vec<Part>> {
    Renderer::default().required_parts_for_rendering(message)
}

/// Run the discovery pass alone over `part`.
pub fn discover(part: &Part, options: &RenderOptions) -> Result<Marker> {
    Renderer::new(options.clone()).discover(part)
}
