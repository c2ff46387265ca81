use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to ask the content source for on a single run
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub date: String,
    pub char_budget: usize,
}

impl ContentRequest {
    pub fn new(date: impl Into<String>, char_budget: usize) -> Self {
        Self {
            date: date.into(),
            char_budget,
        }
    }

    /// Date in the "June 1, 2025" form used in prompts and post headers
    pub fn format_date(date: DateTime<Utc>) -> String {
        date.format("%B %-d, %Y").to_string()
    }
}

/// A post ready for delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedPost {
    pub title: String,
    pub date: String,
    pub bullets: Vec<String>,
    pub hashtag_line: String,
    pub rendered_text: String,
    pub character_count: usize,
}

impl FormattedPost {
    /// Static post used when the formatter itself cannot run
    pub fn minimal(date: &str) -> Self {
        let title = crate::tables::DEFAULT_TITLE.to_string();
        let bullets: Vec<String> = crate::tables::GENERIC_BULLETS
            .iter()
            .take(5)
            .map(|b| format!("{}{}", crate::tables::BULLET_MARKER, b))
            .collect();
        let hashtag_line = crate::tables::HASHTAG_LINE.to_string();
        let rendered_text = render(&title, date, &bullets, &hashtag_line);
        let character_count = rendered_text.chars().count();

        Self {
            title,
            date: date.to_string(),
            bullets,
            hashtag_line,
            rendered_text,
            character_count,
        }
    }

    pub fn preview(&self, max_chars: usize) -> String {
        self.rendered_text.chars().take(max_chars).collect()
    }
}

/// Lays out header, bullet lines and hashtag line into the final text
pub fn render(title: &str, date: &str, bullets: &[String], hashtag_line: &str) -> String {
    let mut text = String::new();
    text.push_str(&format!("📈 **{}**\n", title));
    text.push_str(&format!("📅 {}\n\n", date));
    text.push_str(&bullets.join("\n"));
    text.push_str("\n\n");
    text.push_str(hashtag_line);
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageCategory {
    Bitcoin,
    Ethereum,
    Trading,
    Blockchain,
    Fallback,
    Placeholder,
}

impl ImageCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ImageCategory::Bitcoin => "bitcoin",
            ImageCategory::Ethereum => "ethereum",
            ImageCategory::Trading => "trading",
            ImageCategory::Blockchain => "blockchain",
            ImageCategory::Fallback => "fallback",
            ImageCategory::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub url: String,
    pub source_category: ImageCategory,
    /// Stable identity of the underlying image, independent of URL parameters
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub success: bool,
    pub channel: String,
    /// True when the photo could not be used (rejected, or the post was too long
    /// for a caption) and the text-only message was sent instead
    pub fell_back_to_text: bool,
}
