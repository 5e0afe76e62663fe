//! Template expansion.
//!
//! Templates use a small ctemplate-compatible syntax:
//!
//! - `{{NAME}}`: scalar substitution, looked up from the innermost section
//!   outwards; missing names expand to nothing
//! - `{{NAME:h}}` / `{{NAME:u}}`: HTML-escaped / URL-escaped substitution
//! - `{{#NAME}}…{{/NAME}}`: section, shown once per dictionary bound to `NAME`
//! - `{{#NAME_separator}}…{{/NAME_separator}}`: inside section `NAME`,
//!   shown between repetitions only
//! - `{{! comment }}`
//!
//! Whitespace is kept as written.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::TemplateError;

/// `{{NAME:u}}` leaves only the RFC 3986 unreserved characters as they are.
const URL_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Nested key → value structure a template is expanded against.
pub type TemplateValues = BTreeMap<String, TemplateValue>;

/// A value bound to a template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    /// Substituted by `{{NAME}}`.
    Text(String),
    /// Opens `{{#NAME}}` once with the nested values.
    Section(TemplateValues),
    /// Opens `{{#NAME}}` once per element.
    List(Vec<TemplateValues>),
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<TemplateValues> for TemplateValue {
    fn from(values: TemplateValues) -> Self {
        Self::Section(values)
    }
}

impl From<Vec<TemplateValues>> for TemplateValue {
    fn from(items: Vec<TemplateValues>) -> Self {
        Self::List(items)
    }
}

/// Parse `template` and expand it against `values`.
pub fn render_template(template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let nodes = parse(template)?;
    let mut out = String::with_capacity(template.len());
    let mut scopes = vec![values];
    expand(&nodes, &mut scopes, &mut out);
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Html,
    Url,
}

#[derive(Debug, PartialEq, Eq)]
enum Node {
    Literal(String),
    Variable {
        name: String,
        modifiers: Vec<Modifier>,
    },
    Section {
        name: String,
        children: Vec<Node>,
    },
}

/// An open section while parsing: its name and the nodes collected so far.
struct Frame {
    name: String,
    nodes: Vec<Node>,
}

fn parse(template: &str) -> Result<Vec<Node>, TemplateError> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut nodes: Vec<Node> = Vec::new();
    let mut pos = 0;

    while let Some(rel) = template[pos..].find("{{") {
        let start = pos + rel;
        if start > pos {
            current(&mut stack, &mut nodes).push(Node::Literal(template[pos..start].to_string()));
        }
        let inner_start = start + 2;
        let rel_end = template[inner_start..]
            .find("}}")
            .ok_or(TemplateError::UnterminatedTag(start))?;
        let inner = template[inner_start..inner_start + rel_end].trim();
        pos = inner_start + rel_end + 2;

        let mut chars = inner.chars();
        match chars.next() {
            None => return Err(TemplateError::EmptyTag(start)),
            Some('!') => {}
            Some('#') => {
                let name = check_name(chars.as_str().trim(), start)?;
                stack.push(Frame {
                    name,
                    nodes: Vec::new(),
                });
            }
            Some('/') => {
                let name = check_name(chars.as_str().trim(), start)?;
                match stack.pop() {
                    Some(frame) if frame.name == name => {
                        current(&mut stack, &mut nodes).push(Node::Section {
                            name: frame.name,
                            children: frame.nodes,
                        });
                    }
                    _ => return Err(TemplateError::MismatchedSection { found: name }),
                }
            }
            Some('>') | Some('=') | Some('%') => {
                return Err(TemplateError::UnsupportedTag(inner.to_string()));
            }
            Some(_) => {
                let mut pieces = inner.split(':');
                let name = check_name(pieces.next().unwrap_or_default().trim(), start)?;
                let modifiers = pieces
                    .filter_map(|m| parse_modifier(m.trim()).transpose())
                    .collect::<Result<Vec<_>, _>>()?;
                current(&mut stack, &mut nodes).push(Node::Variable { name, modifiers });
            }
        }
    }

    if pos < template.len() {
        current(&mut stack, &mut nodes).push(Node::Literal(template[pos..].to_string()));
    }

    match stack.pop() {
        Some(frame) => Err(TemplateError::UnclosedSection(frame.name)),
        None => Ok(nodes),
    }
}

fn current<'a>(stack: &'a mut [Frame], root: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => &mut frame.nodes,
        None => root,
    }
}

fn check_name(name: &str, offset: usize) -> Result<String, TemplateError> {
    if name.is_empty() {
        return Err(TemplateError::EmptyTag(offset));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TemplateError::InvalidName {
            name: name.to_string(),
            offset,
        });
    }
    Ok(name.to_string())
}

fn parse_modifier(modifier: &str) -> Result<Option<Modifier>, TemplateError> {
    match modifier {
        "h" => Ok(Some(Modifier::Html)),
        "u" => Ok(Some(Modifier::Url)),
        "none" => Ok(None),
        other => Err(TemplateError::UnknownModifier(other.to_string())),
    }
}

fn lookup<'v>(scopes: &[&'v TemplateValues], name: &str) -> Option<&'v TemplateValue> {
    scopes.iter().rev().find_map(|scope| scope.get(name))
}

fn expand<'v>(nodes: &[Node], scopes: &mut Vec<&'v TemplateValues>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Variable { name, modifiers } => {
                if let Some(TemplateValue::Text(value)) = lookup(scopes, name) {
                    let mut value = value.clone();
                    for modifier in modifiers {
                        value = apply_modifier(*modifier, &value);
                    }
                    out.push_str(&value);
                }
            }
            Node::Section { name, children } => {
                let dicts: Vec<&'v TemplateValues> = match lookup(scopes, name) {
                    Some(TemplateValue::Section(dict)) => vec![dict],
                    Some(TemplateValue::List(items)) => items.iter().collect(),
                    Some(TemplateValue::Text(_)) | None => Vec::new(),
                };
                let separator = format!("{name}_separator");
                let count = dicts.len();
                for (idx, dict) in dicts.into_iter().enumerate() {
                    scopes.push(dict);
                    for child in children {
                        match child {
                            Node::Section { name: child_name, children: sep }
                                if *child_name == separator =>
                            {
                                if idx + 1 < count {
                                    expand(sep, scopes, out);
                                }
                            }
                            other => expand(std::slice::from_ref(other), scopes, out),
                        }
                    }
                    scopes.pop();
                }
            }
        }
    }
}

fn apply_modifier(modifier: Modifier, value: &str) -> String {
    match modifier {
        Modifier::Html => escape_html(value),
        Modifier::Url => escape_url(value),
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_url(value: &str) -> String {
    utf8_percent_encode(value, URL_UNRESERVED).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, TemplateValue)]) -> TemplateValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_scalar_substitution() {
        let v = values(&[("NAME", "world".into())]);
        assert_eq!(render_template("Hello {{NAME}}!", &v).unwrap(), "Hello world!");
    }

    #[test]
    fn test_missing_variable_is_empty() {
        let v = TemplateValues::new();
        assert_eq!(render_template("[{{NOPE}}]", &v).unwrap(), "[]");
    }

    #[test]
    fn test_whitespace_is_kept() {
        let v = values(&[("X", "1".into())]);
        assert_eq!(
            render_template("  a\n\t{{ X }}  \n", &v).unwrap(),
            "  a\n\t1  \n"
        );
    }

    #[test]
    fn test_section_from_nested_values() {
        let header = values(&[("SUBJECT", "Hi".into())]);
        let v = values(&[("HEADER", header.into())]);
        let out = render_template("{{#HEADER}}Subject: {{SUBJECT}}{{/HEADER}}", &v).unwrap();
        assert_eq!(out, "Subject: Hi");
    }

    #[test]
    fn test_absent_section_is_hidden() {
        let v = values(&[("HEADER", "not a section".into())]);
        let out = render_template("a{{#HEADER}}hidden{{/HEADER}}b", &v).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_list_with_separator() {
        let items = vec![
            values(&[("N", "a".into())]),
            values(&[("N", "b".into())]),
            values(&[("N", "c".into())]),
        ];
        let v = values(&[("ITEM", items.into())]);
        let out = render_template(
            "{{#ITEM}}{{N}}{{#ITEM_separator}}, {{/ITEM_separator}}{{/ITEM}}",
            &v,
        )
        .unwrap();
        assert_eq!(out, "a, b, c");
    }

    #[test]
    fn test_inner_scope_sees_outer_values() {
        let inner = values(&[("LOCAL", "l".into())]);
        let v = values(&[("OUTER", "o".into()), ("SEC", inner.into())]);
        let out = render_template("{{#SEC}}{{OUTER}}{{LOCAL}}{{/SEC}}", &v).unwrap();
        assert_eq!(out, "ol");
    }

    #[test]
    fn test_modifiers() {
        let v = values(&[("V", "<a href=\"x\">&</a>".into()), ("Q", "a b/c".into())]);
        assert_eq!(
            render_template("{{V:h}}", &v).unwrap(),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
        assert_eq!(render_template("{{Q:u}}", &v).unwrap(), "a%20b%2Fc");
        assert_eq!(render_template("{{Q:none}}", &v).unwrap(), "a b/c");
    }

    #[test]
    fn test_url_modifier_keeps_unreserved_and_encodes_utf8() {
        let v = values(&[("Q", "Café-menu_v1.2~?x=1&y".into())]);
        assert_eq!(
            render_template("{{Q:u}}", &v).unwrap(),
            "Caf%C3%A9-menu_v1.2~%3Fx%3D1%26y"
        );
    }

    #[test]
    fn test_comment_renders_nothing() {
        let v = TemplateValues::new();
        assert_eq!(render_template("a{{! note }}b", &v).unwrap(), "ab");
    }

    #[test]
    fn test_values_are_not_reexpanded() {
        let v = values(&[("TEXT", "{{#X}}literal{{/Y}}".into())]);
        assert_eq!(
            render_template("{{TEXT}}", &v).unwrap(),
            "{{#X}}literal{{/Y}}"
        );
    }

    #[test]
    fn test_syntax_errors() {
        let v = TemplateValues::new();
        assert_eq!(
            render_template("abc {{NAME", &v),
            Err(TemplateError::UnterminatedTag(4))
        );
        assert_eq!(render_template("{{}}", &v), Err(TemplateError::EmptyTag(0)));
        assert!(matches!(
            render_template("{{BAD NAME}}", &v),
            Err(TemplateError::InvalidName { .. })
        ));
        assert_eq!(
            render_template("{{X:zz}}", &v),
            Err(TemplateError::UnknownModifier("zz".into()))
        );
        assert_eq!(
            render_template("{{#A}}x", &v),
            Err(TemplateError::UnclosedSection("A".into()))
        );
        assert_eq!(
            render_template("{{#A}}x{{/B}}", &v),
            Err(TemplateError::MismatchedSection { found: "B".into() })
        );
        assert!(matches!(
            render_template("{{>PARTIAL}}", &v),
            Err(TemplateError::UnsupportedTag(_))
        ));
    }
}
