//! Write attachment bodies to disk.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::model::attachment::AttachmentMeta;
use crate::model::part::{Content, Part};
use crate::store::PartStore;

/// Write every single part in `parts` to `output_dir`.
///
/// Local parts are written from their own bytes; remote parts from `store`.
/// Parts without reachable bytes (and containers) are skipped with a
/// warning. Returns the paths written, in order.
pub fn export_parts(
    parts: &[Part],
    store: Option<&PartStore>,
    output_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut paths = Vec::with_capacity(parts.len());

    for (idx, part) in parts.iter().enumerate() {
        let Part::Single(single) = part else {
            warn!(part_id = part.part_id(), mime_type = part.mime_type(), "Skipping container part");
            continue;
        };

        let data = match &single.content {
            Content::Local(bytes) => Some(bytes.as_slice()),
            Content::Remote { .. } => store.and_then(|s| s.get(&single.part_id)),
        };
        let Some(data) = data else {
            warn!(part_id = %single.part_id, "No bytes for attachment, skipping");
            continue;
        };

        let meta = AttachmentMeta::from_part(part, idx);
        let path = unique_path(&output_dir.join(sanitize_filename(&meta.filename, 150)));
        std::fs::write(&path, data)?;
        debug!(part_id = %single.part_id, path = %path.display(), "Exported attachment");
        paths.push(path);
    }

    Ok(paths)
}

/// Sanitize a string for use as a filename.
///
/// Replaces path separators and other unsafe characters with `_` and
/// truncates to `max_len` characters.
pub fn sanitize_filename(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    let trimmed = sanitized.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// If `path` already exists, append ` (n)` to the stem to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem} ({i})"))
        } else {
            parent.join(format!("{stem} ({i}).{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    parent.join(format!("{stem} (dup).{ext}"))
}
