//! Integration tests for rendering parsed messages and collecting their parts.

use std::path::Path;

use assert_fs::prelude::*;
use predicates::prelude::*;

use mailrender::config::{ConfiguredTemplates, TemplatesConfig};
use mailrender::export::attachment::export_parts;
use mailrender::model::part::Part;
use mailrender::parser::eml::{parse_eml, parse_eml_remote};
use mailrender::render::callback::{DefaultTemplates, TemplateCallback};
use mailrender::render::traversal::Marker;
use mailrender::render::{self, RenderOptions, Renderer};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn part_ids(parts: &[Part]) -> Vec<&str> {
    parts.iter().map(Part::part_id).collect()
}

/// Remembers the mode it was told about.
#[derive(Default)]
struct ModeSpy {
    mode: Option<bool>,
}

impl TemplateCallback for ModeSpy {
    fn set_mixed_text_and_attachments_mode(&mut self, enabled: bool) {
        self.mode = Some(enabled);
    }
}

// ─── Plain rendering ────────────────────────────────────────────────

#[test]
fn test_simple_message_renders_its_text() {
    let message = parse_eml(fixture("simple.eml")).unwrap();
    let text = render::render_local(&message, &mut DefaultTemplates).unwrap();
    assert!(predicate::str::starts_with("Hello there,").eval(&text));
    assert!(predicate::str::contains("This is a simple message.").eval(&text));
}

#[test]
fn test_alternative_renders_plain_branch() {
    let message = parse_eml(fixture("newsletter.eml")).unwrap();
    let text = render::render_local(&message, &mut DefaultTemplates).unwrap();
    assert!(text.starts_with("Café news this month."));
    assert!(!text.contains("<p>"));
}

#[test]
fn test_forwarded_message_is_rendered_inline() {
    let message = parse_eml(fixture("forwarded.eml")).unwrap();
    let text = render::render_local(&message, &mut DefaultTemplates).unwrap();
    let outer = text.find("See the notes below.").unwrap();
    let inner = text.find("Notes in plain text.").unwrap();
    assert!(outer < inner);
    assert!(!text.contains("Notes in HTML"));
}

#[test]
fn test_html_only_needs_html_to_text() {
    let message = parse_eml(fixture("html_only.eml")).unwrap();
    assert_eq!(render::render_local(&message, &mut DefaultTemplates).unwrap(), "");

    let renderer = Renderer::new(RenderOptions {
        html_to_text: true,
        ..Default::default()
    });
    let text = renderer.render_local(&message, &mut DefaultTemplates).unwrap();
    let expected = predicate::str::contains("Order shipped")
        .and(predicate::str::contains("Tracking: 1Z 999"))
        .and(predicate::str::contains("color").not());
    assert!(expected.eval(&text), "unexpected text: {text:?}");
}

// ─── Mixed text and attachments mode ────────────────────────────────

#[test]
fn test_attachment_before_text_enables_mixed_mode() {
    let message = parse_eml(fixture("attachment_first.eml")).unwrap();
    let mut spy = ModeSpy::default();
    let text = render::render_local(&message, &mut spy).unwrap();
    assert_eq!(spy.mode, Some(true));
    assert_eq!(text.trim_end(), "Scanned on the third floor.");
    assert_eq!(
        render::discover(message.main_part(), &RenderOptions::default()).unwrap(),
        Marker::HadAttachmentThenText
    );
}

#[test]
fn test_text_before_attachment_keeps_mode_off() {
    let message = parse_eml(fixture("newsletter.eml")).unwrap();
    let mut spy = ModeSpy::default();
    render::render_local(&message, &mut spy).unwrap();
    assert_eq!(spy.mode, Some(false));
}

#[test]
fn test_configured_attachment_listing() {
    let message = parse_eml(fixture("newsletter.eml")).unwrap();
    let mut templates = ConfiguredTemplates::new(TemplatesConfig {
        attachment: Some("* {{FILENAME}} ({{MIMETYPE}})".into()),
        attachment_separator: Some("\n\nAttachments:\n".into()),
        ..Default::default()
    });
    let text = render::render_local(&message, &mut templates).unwrap();
    assert!(text.ends_with("\n\nAttachments:\n* archive.zip (application/zip)"));
}

// ─── Collectors ─────────────────────────────────────────────────────

#[test]
fn test_attachments_for_skips_unselected_alternatives() {
    let message = parse_eml(fixture("newsletter.eml")).unwrap();
    assert_eq!(part_ids(&render::attachments_for(&message).unwrap()), vec!["2"]);
    // The related branch is never chosen, so its image is not collected.
    assert!(render::inline_attachments_for(&message).unwrap().is_empty());
}

#[test]
fn test_inline_attachments_for_related_root() {
    let message = parse_eml(fixture("invite.eml")).unwrap();
    let text = render::render_local(&message, &mut DefaultTemplates).unwrap();
    assert!(text.starts_with("You are invited to the launch party."));

    let inline = render::inline_attachments_for(&message).unwrap();
    assert_eq!(part_ids(&inline), vec!["2"]);
    assert_eq!(inline[0].content_id(), Some("banner@events"));
    assert!(render::attachments_for(&message).unwrap().is_empty());
}

#[test]
fn test_parsed_messages_need_no_fetches() {
    let message = parse_eml(fixture("forwarded.eml")).unwrap();
    assert!(render::required_parts_for_rendering(&message)
        .unwrap()
        .is_empty());
}

// ─── Remote rendering ───────────────────────────────────────────────

#[test]
fn test_required_parts_for_remote_message() {
    let (message, _store) = parse_eml_remote(fixture("forwarded.eml"), "INBOX").unwrap();
    let required = render::required_parts_for_rendering(&message).unwrap();
    assert_eq!(part_ids(&required), vec!["1", "2.2"]);
}

#[test]
fn test_remote_render_matches_local_render() {
    let local = parse_eml(fixture("newsletter.eml")).unwrap();
    let (remote, mut store) = parse_eml_remote(fixture("newsletter.eml"), "INBOX").unwrap();

    let expected = render::render_local(&local, &mut DefaultTemplates).unwrap();
    let actual = render::render(&remote, &mut store, &mut DefaultTemplates).unwrap();
    assert_eq!(actual, expected);
    assert_eq!(store.fetches(), 1);
}

#[test]
fn test_rendering_twice_is_identical() {
    let message = parse_eml(fixture("newsletter.eml")).unwrap();
    let renderer = Renderer::default();
    let first = renderer
        .render_full(&message, &mut mailrender::render::callback::NoData, &mut ModeSpy::default())
        .unwrap();
    let second = renderer
        .render_full(&message, &mut mailrender::render::callback::NoData, &mut ModeSpy::default())
        .unwrap();
    assert_eq!(first, second);
}

// ─── Export ─────────────────────────────────────────────────────────

#[test]
fn test_extract_attachments_to_directory() {
    let temp = assert_fs::TempDir::new().unwrap();
    let message = parse_eml(fixture("newsletter.eml")).unwrap();
    let parts = render::attachments_for(&message).unwrap();

    let paths = export_parts(&parts, None, temp.path()).unwrap();
    assert_eq!(paths.len(), 1);
    temp.child("archive.zip").assert(predicate::path::exists());
    temp.child("archive.zip").assert(&b"PK\x03\x04"[..]);
}

#[test]
fn test_extract_remote_inline_attachments() {
    let temp = assert_fs::TempDir::new().unwrap();
    let (message, store) = parse_eml_remote(fixture("invite.eml"), "Events").unwrap();
    let parts = render::inline_attachments_for(&message).unwrap();

    export_parts(&parts, Some(&store), temp.path()).unwrap();
    temp.child("banner.png").assert(predicate::path::is_file());
}
