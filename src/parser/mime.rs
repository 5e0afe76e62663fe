//! MIME message parsing: raw RFC 822 bytes to a [`Part`] tree.
//!
//! `mail-parser` does the heavy lifting (transfer decoding, charset
//! conversion, encoded-word headers). This module maps its flat part list
//! onto the renderer's tree and numbers the result.

use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser, MimeHeaders, PartType};
use tracing::debug;

use crate::model::message::{Message, MessageHeader, ParsedMessage, RemoteMessage};
use crate::model::part::{Content, MessagePart, Multipart, MultipartKind, Part, SinglePart};
use crate::store::PartStore;

/// Nesting beyond this is kept as an opaque leaf (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 64;

/// Parse a complete raw message (headers + body) into a message with local content.
///
/// Returns `None` when `mail-parser` cannot make sense of the bytes.
pub fn parse_message(raw_message: &[u8]) -> Option<Message> {
    let message_bytes = skip_from_line(raw_message);
    let parsed = MessageParser::default().parse(message_bytes)?;

    let mut main_part = convert_part(&parsed, 0, 0)?;
    main_part.assign_part_ids();

    Some(
        ParsedMessage {
            header: header_of(&parsed),
            main_part,
            raw_size: raw_message.len() as u64,
        }
        .into(),
    )
}

/// Parse a message as if its bodies lived in a remote store.
///
/// Every single part becomes [`Content::Remote`]; its bytes move into the
/// returned [`PartStore`], keyed by part id.
pub fn parse_remote(raw_message: &[u8], folder: &str, uid: u32) -> Option<(Message, PartStore)> {
    let Message::Parsed(parsed) = parse_message(raw_message)? else {
        return None;
    };

    let mut store = PartStore::new();
    let mut main_part = parsed.main_part;
    detach_content(&mut main_part, &mut store);
    debug!(folder, uid, parts = store.len(), "Detached part bodies into store");

    let message = RemoteMessage {
        folder: folder.to_string(),
        uid,
        header: parsed.header,
        main_part,
    };
    Some((message.into(), store))
}

fn detach_content(part: &mut Part, store: &mut PartStore) {
    match part {
        Part::Single(single) => {
            let size = single.content.size();
            let content = std::mem::replace(&mut single.content, Content::Remote { size });
            if let Content::Local(bytes) = content {
                store.insert(single.part_id.clone(), bytes);
            }
        }
        Part::Message(message) => detach_content(&mut message.main_part, store),
        Part::Multipart(multipart) => {
            for child in &mut multipart.parts {
                detach_content(child, store);
            }
        }
    }
}

/// Convert part `id` of `message`, recursing into containers.
fn convert_part(message: &mail_parser::Message<'_>, id: usize, depth: usize) -> Option<Part> {
    let part = message.parts.get(id)?;
    let mime_type = mime_type_of(part);

    if depth > MAX_DEPTH {
        debug!(mime_type = %mime_type, depth, "Nesting too deep, keeping part opaque");
        let mut single = SinglePart::new("application/octet-stream", Content::Local(Vec::new()));
        single.is_attachment = true;
        return Some(single.into());
    }

    let converted = match &part.body {
        PartType::Multipart(children) => {
            let subtype = mime_type.split_once('/').map(|(_, sub)| sub).unwrap_or("mixed");
            let parts = children
                .iter()
                .filter_map(|&child| convert_part(message, child, depth + 1))
                .collect();
            let mut multipart = Multipart::new(MultipartKind::from_subtype(subtype), parts);
            multipart.mime_type = mime_type;
            multipart.into()
        }
        PartType::Message(nested) => {
            let main_part = convert_part(nested, 0, depth + 1)?;
            let mut embedded = MessagePart::new(header_of(nested), main_part);
            embedded.mime_type = mime_type;
            embedded.into()
        }
        PartType::Text(text) | PartType::Html(text) => {
            // mail-parser has already transcoded the body to UTF-8.
            let mut single = SinglePart::new(mime_type, Content::Local(text.as_bytes().to_vec()));
            single.charset = Some("utf-8".to_string());
            single_metadata(part, single).into()
        }
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            let mut single = SinglePart::new(mime_type, Content::Local(bytes.to_vec()));
            single.charset = part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .map(String::from);
            single_metadata(part, single).into()
        }
    };
    Some(converted)
}

/// Fill in filename, content-id and disposition flags.
fn single_metadata(part: &mail_parser::MessagePart<'_>, mut single: SinglePart) -> SinglePart {
    single.filename = part.attachment_name().map(String::from);
    single.content_id = part
        .content_id()
        .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string());

    let disposition = part
        .content_disposition()
        .map(|d| d.ctype().to_ascii_lowercase());
    match disposition.as_deref() {
        Some("attachment") => single.is_attachment = true,
        Some("inline") => {
            let is_text = single.mime_type.eq_ignore_ascii_case("text/plain")
                || single.mime_type.eq_ignore_ascii_case("text/html");
            single.is_inline_attachment = single.filename.is_some() || !is_text;
        }
        _ => {}
    }
    single
}

/// Lowercased `type/subtype`, with RFC 2045 defaults when the header is missing.
fn mime_type_of(part: &mail_parser::MessagePart<'_>) -> String {
    if let Some(ct) = part.content_type() {
        let main = ct.ctype();
        if !main.is_empty() {
            let mime_type = match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            };
            return mime_type.to_ascii_lowercase();
        }
    }
    match &part.body {
        PartType::Text(_) => "text/plain",
        PartType::Html(_) => "text/html",
        PartType::Multipart(_) => "multipart/mixed",
        PartType::Message(_) => "message/rfc822",
        PartType::Binary(_) | PartType::InlineBinary(_) => "application/octet-stream",
    }
    .to_string()
}

fn header_of(message: &mail_parser::Message<'_>) -> MessageHeader {
    MessageHeader {
        subject: message.subject().map(String::from),
        from: message.from().and_then(|from| format_addresses(from).into_iter().next()),
        to: message.to().map(format_addresses).unwrap_or_default(),
        date: message.date().and_then(|date| {
            DateTime::parse_from_rfc3339(&date.to_rfc3339())
                .ok()
                .map(|d| d.with_timezone(&Utc))
        }),
        message_id: message.message_id().map(String::from),
    }
}

/// `Name <address>` (or the bare address) for every mailbox, groups flattened.
fn format_addresses(address: &Address<'_>) -> Vec<String> {
    let addrs: Vec<&mail_parser::Addr<'_>> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };
    addrs
        .into_iter()
        .filter_map(|addr| {
            let email = addr.address.as_deref();
            let name = addr.name.as_deref().filter(|n| !n.is_empty());
            match (name, email) {
                (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
                (None, Some(email)) => Some(email.to_string()),
                (Some(name), None) => Some(name.to_string()),
                (None, None) => None,
            }
        })
        .collect()
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
