//! Loading individual `.eml` files (RFC 5322 messages, optionally with MBOX framing).

use std::path::Path;

use crate::error::{RenderError, Result};
use crate::model::message::Message;
use crate::parser::mime;
use crate::store::PartStore;

/// Parse a single `.eml` file into a message with local content.
pub fn parse_eml(path: impl AsRef<Path>) -> Result<Message> {
    let path = path.as_ref();
    let data = read_file(path)?;
    mime::parse_message(&data).ok_or_else(|| RenderError::InvalidMessage(path.to_path_buf()))
}

/// Parse a single `.eml` file as a remote message in `folder`.
///
/// The UID is the file size truncated to 32 bits; it only has to be stable
/// for log output.
pub fn parse_eml_remote(path: impl AsRef<Path>, folder: &str) -> Result<(Message, PartStore)> {
    let path = path.as_ref();
    let data = read_file(path)?;
    let uid = data.len() as u32;
    mime::parse_remote(&data, folder, uid)
        .ok_or_else(|| RenderError::InvalidMessage(path.to_path_buf()))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RenderError::FileNotFound(path.to_path_buf())
        } else {
            RenderError::io(path, e)
        }
    })
}
