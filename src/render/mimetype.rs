//! Mime-type predicates used by the traversal.

use crate::error::{RenderError, Result};
use crate::model::part::{Part, SinglePart};

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";

/// Lowercased MIME type of a part.
///
/// # Panics
///
/// Panics when the type is empty: parsers must give every part a type, so
/// an untyped part is a bug upstream rather than something to render around.
pub fn mime_type_of(part: &Part) -> String {
    checked_lowercase(part.mime_type(), part.part_id())
}

/// Same as [`mime_type_of`] for a single part.
pub fn single_mime_type(part: &SinglePart) -> String {
    checked_lowercase(&part.mime_type, &part.part_id)
}

fn checked_lowercase(mime_type: &str, part_id: &str) -> String {
    let mime_type = mime_type.trim();
    assert!(
        !mime_type.is_empty(),
        "part '{part_id}' has no MIME type; the part tree builder must set one"
    );
    mime_type.to_ascii_lowercase()
}

/// Whether a single part counts as body text rather than an attachment.
///
/// Inline attachments always qualify on type alone. Other parts are
/// excluded when flagged as attachments, or when they carry a filename and
/// a text part has already been rendered.
pub fn is_text_part(part: &SinglePart, first_rendered: bool) -> bool {
    let mime_type = single_mime_type(part);

    if !part.is_inline_attachment
        && (part.is_attachment || (part.filename.is_some() && first_rendered))
    {
        return false;
    }

    mime_type == TEXT_PLAIN || mime_type == TEXT_HTML
}

/// Whether `mime_type` appears anywhere in the subtree rooted at `part`,
/// which sits at nesting `depth`.
///
/// `mime_type` must be lowercase.
///
/// # Errors
///
/// [`RenderError::TooDeep`] when the search has to descend past `max_depth`.
pub fn part_contains_mime_type(
    part: &Part,
    mime_type: &str,
    depth: usize,
    max_depth: usize,
) -> Result<bool> {
    if depth > max_depth {
        return Err(RenderError::TooDeep { limit: max_depth });
    }
    match part {
        Part::Single(_) => Ok(mime_type_of(part) == mime_type),
        Part::Message(p) => part_contains_mime_type(&p.main_part, mime_type, depth + 1, max_depth),
        Part::Multipart(p) => {
            for child in &p.parts {
                if part_contains_mime_type(child, mime_type, depth + 1, max_depth)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// The alternative to render: the last child whose subtree contains `text/plain`.
///
/// `depth` is the nesting depth of the children themselves.
pub fn preferred_alternative(parts: &[Part], depth: usize, max_depth: usize) -> Result<Option<&Part>> {
    for child in parts.iter().rev() {
        if part_contains_mime_type(child, TEXT_PLAIN, depth, max_depth)? {
            return Ok(Some(child));
        }
    }
    Ok(None)
}
