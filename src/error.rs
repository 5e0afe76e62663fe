//! Centralized error types for mailrender.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailrender library.
#[derive(Error, Debug)]
pub enum RenderError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file could not be parsed as an RFC 822 message.
    #[error("File does not appear to be a valid message: {0}")]
    InvalidMessage(PathBuf),

    /// The part tree is nested deeper than the configured limit.
    #[error("Part tree exceeds the maximum nesting depth of {limit}")]
    TooDeep { limit: usize },
}

/// Syntax errors reported by the template expander.
///
/// Offsets are byte positions in the template text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// `{{` without a matching `}}`.
    #[error("unterminated tag at byte {0}")]
    UnterminatedTag(usize),

    /// `{{}}` or a marker with no name.
    #[error("empty tag at byte {0}")]
    EmptyTag(usize),

    /// A name containing characters outside `[A-Za-z0-9_]`.
    #[error("invalid name '{name}' at byte {offset}")]
    InvalidName { name: String, offset: usize },

    /// A variable modifier other than `h`, `u` or `none`.
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),

    /// A tag kind the expander does not implement (includes, set-delimiters).
    #[error("unsupported tag '{0}'")]
    UnsupportedTag(String),

    /// A section close that does not match the innermost open section.
    #[error("unexpected close of section '{found}'")]
    MismatchedSection { found: String },

    /// A section left open at the end of the template.
    #[error("section '{0}' is never closed")]
    UnclosedSection(String),
}

/// Convenience alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_deep_message() {
        let err = RenderError::TooDeep { limit: 4 };
        assert_eq!(
            err.to_string(),
            "Part tree exceeds the maximum nesting depth of 4"
        );
    }

    #[test]
    fn test_template_error_message() {
        let err = TemplateError::UnclosedSection("ITEMS".into());
        assert_eq!(err.to_string(), "section 'ITEMS' is never closed");
    }
}
