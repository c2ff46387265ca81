//! Cleanup of raw model output before it is split into bullets.

use once_cell::sync::Lazy;
use regex::Regex;

struct Patterns {
    citations: Regex,
    headings: Regex,
    bold: Regex,
    underline_bold: Regex,
    italic: Regex,
    underscore_italic: Regex,
    code: Regex,
    whitespace: Regex,
}

static PATTERNS: Lazy<Option<Patterns>> = Lazy::new(|| {
    Some(Patterns {
        citations: Regex::new(r"\[\d+(?:\s*,\s*\d+)*\]").ok()?,
        headings: Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").ok()?,
        bold: Regex::new(r"\*\*([^*]+?)\*\*").ok()?,
        underline_bold: Regex::new(r"__([^_]+?)__").ok()?,
        italic: Regex::new(r"\*([^*\s][^*]*?)\*").ok()?,
        underscore_italic: Regex::new(r"(^|[^\w])_([^_\s][^_]*?)_([^\w]|$)").ok()?,
        code: Regex::new(r"`+([^`]*)`+").ok()?,
        whitespace: Regex::new(r"\s+").ok()?,
    })
});

// Each pass only removes markup, so this converges well before the cap
const MAX_PASSES: usize = 8;

/// Strips citation markers and markdown emphasis, then collapses whitespace.
///
/// Applying it to its own output returns the same string.
pub fn normalize(text: &str) -> String {
    let Some(patterns) = PATTERNS.as_ref() else {
        return text.to_string();
    };

    let mut current = single_pass(patterns, text);
    for _ in 1..MAX_PASSES {
        let next = single_pass(patterns, &current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn single_pass(p: &Patterns, text: &str) -> String {
    let text = p.citations.replace_all(text, "");
    let text = p.headings.replace_all(&text, "");
    let text = p.bold.replace_all(&text, "$1");
    let text = p.underline_bold.replace_all(&text, "$1");
    let text = p.italic.replace_all(&text, "$1");
    let text = p.underscore_italic.replace_all(&text, "$1$2$3");
    let text = p.code.replace_all(&text, "$1");
    let text = p.whitespace.replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Citation Tests ====================

    #[test]
    fn test_removes_single_citations() {
        assert_eq!(
            normalize("Bitcoin rose 3%[1] on Monday[2]."),
            "Bitcoin rose 3% on Monday."
        );
    }

    #[test]
    fn test_removes_grouped_citations() {
        assert_eq!(normalize("ETH gained [1, 3,4] today"), "ETH gained today");
    }

    #[test]
    fn test_keeps_non_numeric_brackets() {
        assert_eq!(normalize("see [note] here"), "see [note] here");
    }

    // ==================== Markdown Tests ====================

    #[test]
    fn test_strips_bold_and_italic() {
        assert_eq!(
            normalize("**Bitcoin** is *up* and __ETH__ is _flat_"),
            "Bitcoin is up and ETH is flat"
        );
    }

    #[test]
    fn test_strips_headings_and_code() {
        assert_eq!(
            normalize("## Market Summary\nUse `BTC` ticker"),
            "Market Summary Use BTC ticker"
        );
    }

    #[test]
    fn test_keeps_underscores_inside_words() {
        assert_eq!(normalize("snake_case_name stays"), "snake_case_name stays");
    }

    // ==================== Whitespace Tests ====================

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("  a \n\n b\t\tc  "), "a b c");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
    }

    // ==================== Idempotence Tests ====================

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "**Bitcoin** [1] rose *3%*\n\n# Heading\n`code`",
            "a * b * c",
            "**a*",
            "***nested*** __mixed_ markers__",
            "plain text already clean",
            "[1][2][3]",
        ];

        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
