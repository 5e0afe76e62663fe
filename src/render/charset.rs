//! Turning part bytes into text.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::warn;

/// Decode `bytes` using the declared charset, falling back to detection.
///
/// The declared charset wins when `encoding_rs` knows the label and the
/// bytes decode without errors under it. Otherwise the charset is detected:
/// a byte-order mark, then strict UTF-8, then Windows-1252 (which accepts
/// every byte).
pub fn decode_text(bytes: &[u8], declared: Option<&str>) -> String {
    if let Some(label) = declared {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => {
                if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
                {
                    return text.into_owned();
                }
            }
            None => {
                warn!(charset = label, "Unknown charset, detecting instead");
            }
        }
    }
    detect_and_decode(bytes)
}

/// Decode without a declared charset.
pub fn detect_and_decode(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return decoded.into_owned();
    }

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return text.into_owned();
    }

    let (decoded, _, _) = WINDOWS_1252.decode(bytes);
    decoded.into_owned()
}
