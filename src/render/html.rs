//! Flattening `text/html` bodies when the caller opts into it.

/// Convert HTML to plain text.
///
/// - Line breaks from `<br>`, `<p>`, `<div>`, list items, table rows and headings
/// - `<script>` and `<style>` blocks removed
/// - Common entities decoded
/// - Runs of blank lines collapsed to one
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    for tag in &["br", "br/", "br /"] {
        text = replace_ignore_case(&text, &format!("<{tag}>"), "\n");
    }
    for tag in &["p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6"] {
        text = replace_ignore_case(&text, &format!("<{tag}>"), "\n");
        text = replace_ignore_case(&text, &format!("<{tag} "), "\n<");
        text = replace_ignore_case(&text, &format!("</{tag}>"), "\n");
    }

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    for (entity, replacement) in [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&amp;", "&"),
    ] {
        result = result.replace(entity, replacement);
    }

    let mut prev_was_blank = false;
    let mut cleaned = String::with_capacity(result.len());
    for line in result.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(&open) {
        let start = pos + rel;
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

/// Replace every ASCII-case-insensitive occurrence of `needle`.
fn replace_ignore_case(haystack: &str, needle: &str, replacement: &str) -> String {
    let lower = haystack.to_ascii_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(needle) {
        let start = pos + rel;
        result.push_str(&haystack[pos..start]);
        result.push_str(replacement);
        pos = start + needle.len();
    }
    result.push_str(&haystack[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_basic() {
        let text = html_to_text("<p>Hello <b>world</b></p><P>Second paragraph</P>");
        assert_eq!(text, "Hello world\n\nSecond paragraph");
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
        assert_eq!(html_to_text("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_html_to_text_removes_scripts() {
        let text = html_to_text("Before<SCRIPT>alert('xss')</script>After<style>p{}</style>");
        assert_eq!(text, "BeforeAfter");
    }

    #[test]
    fn test_unclosed_script_drops_rest() {
        assert_eq!(html_to_text("keep<script>var x"), "keep");
    }

    #[test]
    fn test_collapses_blank_lines() {
        let text = html_to_text("a<br><br><br><br>b");
        assert_eq!(text, "a\n\nb");
    }
}
