//! Translation of rendered posts into the platform's HTML parse mode.

/// Escapes HTML and turns `**bold**` spans into `<b>` tags.
///
/// An unmatched trailing `**` is left as literal text.
pub fn to_telegram_html(text: &str) -> String {
    let escaped = escape_html(text);
    let mut out = String::with_capacity(escaped.len() + 16);
    let mut rest = escaped.as_str();

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(0) => {
                // Empty span stays literal
                out.push_str(&rest[..start + 4]);
                rest = &after[2..];
            }
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push_str("<b>");
                out.push_str(&after[..end]);
                out.push_str("</b>");
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Length of the text left after entity parsing, in UTF-16 code units.
///
/// Expects output of [`to_telegram_html`], where every `<` opens a tag.
pub fn visible_utf16_len(html: &str) -> usize {
    let mut len = 0;
    let mut rest = html;
    while let Some(c) = rest.chars().next() {
        if c == '<' {
            if let Some(end) = rest.find('>') {
                rest = &rest[end + 1..];
                continue;
            }
        }
        if c == '&' {
            if let Some(entity) = ENTITIES.iter().find(|e| rest.starts_with(**e)) {
                len += 1;
                rest = &rest[entity.len()..];
                continue;
            }
        }
        len += c.len_utf16();
        rest = &rest[c.len_utf8()..];
    }
    len
}

const ENTITIES: [&str; 3] = ["&amp;", "&lt;", "&gt;"];

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_spans_become_tags() {
        assert_eq!(
            to_telegram_html("📈 **🚀 Crypto Market Update**\n📅 June 1, 2025"),
            "📈 <b>🚀 Crypto Market Update</b>\n📅 June 1, 2025"
        );
    }

    #[test]
    fn test_escapes_generated_content() {
        assert_eq!(
            to_telegram_html("S&P <500> **up**"),
            "S&amp;P &lt;500&gt; <b>up</b>"
        );
    }

    #[test]
    fn test_unmatched_marker_is_literal() {
        assert_eq!(to_telegram_html("a **b"), "a **b");
        assert_eq!(to_telegram_html("**x** and **y"), "<b>x</b> and **y");
    }

    #[test]
    fn test_empty_span_is_literal() {
        assert_eq!(to_telegram_html("****"), "****");
    }

    #[test]
    fn test_spans_after_an_empty_one_still_convert() {
        assert_eq!(
            to_telegram_html("**a** **** **b**"),
            "<b>a</b> **** <b>b</b>"
        );
    }

    // ==================== Visible Length Tests ====================

    #[test]
    fn test_visible_length_ignores_tags_and_counts_entities_once() {
        assert_eq!(visible_utf16_len("<b>x</b> &amp; y"), 5);
        assert_eq!(visible_utf16_len(&to_telegram_html("S&P <500>")), 9);
    }

    #[test]
    fn test_visible_length_counts_utf16_units() {
        // Emoji outside the basic plane take two units, the bullet takes one
        assert_eq!(visible_utf16_len("📈"), 2);
        assert_eq!(visible_utf16_len("• a"), 3);
        assert_eq!(
            visible_utf16_len(&to_telegram_html("📈 **🚀 Crypto Market Update**")),
            26
        );
    }
}
