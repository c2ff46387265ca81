//! Pulls the generated text out of a content API response.
//!
//! Providers are not consistent about the response layout: `choices` may be a
//! list or a single object, and some proxies flatten the text to the top
//! level. Known shapes are tried in a fixed order before falling back to a
//! bounded walk over the whole document.

use serde_json::Value;

/// Top-level fields some providers use instead of `choices`
const ALTERNATIVE_FIELDS: &[&str] = &["content", "text", "output", "response", "answer", "result"];

/// Strings shorter than this are not taken as content during the generic walk
const MIN_LOOSE_CHARS: usize = 20;

/// Nesting limit for the generic walk
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// `choices` is a list of objects carrying `message.content`
    ChoiceList(String),
    /// `choices` is a single object carrying `message.content`
    ChoiceSingle(String),
    /// Text sits directly on the top level (`message.content` or an alternative field)
    DirectMessage(String),
    /// Found by walking the document
    Unknown(String),
}

impl ResponseShape {
    pub fn text(&self) -> &str {
        match self {
            ResponseShape::ChoiceList(text)
            | ResponseShape::ChoiceSingle(text)
            | ResponseShape::DirectMessage(text)
            | ResponseShape::Unknown(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ResponseShape::ChoiceList(text)
            | ResponseShape::ChoiceSingle(text)
            | ResponseShape::DirectMessage(text)
            | ResponseShape::Unknown(text) => text,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::ChoiceList(_) => "choice list",
            ResponseShape::ChoiceSingle(_) => "single choice",
            ResponseShape::DirectMessage(_) => "direct message",
            ResponseShape::Unknown(_) => "document search",
        }
    }
}

pub struct ContentExtractor;

impl ContentExtractor {
    /// Returns the first usable text and the shape it was found in, or `None`.
    pub fn extract(data: &Value) -> Option<ResponseShape> {
        let shape = Self::from_choices(data)
            .or_else(|| Self::from_direct(data))
            .or_else(|| Self::from_walk(data));

        match &shape {
            Some(found) => tracing::debug!(shape = found.name(), "Found content"),
            None => tracing::warn!("No content found in response"),
        }
        shape
    }

    fn from_choices(data: &Value) -> Option<ResponseShape> {
        match data.get("choices")? {
            Value::Array(items) => items
                .iter()
                .find_map(message_content)
                .map(ResponseShape::ChoiceList),
            single @ Value::Object(_) => message_content(single).map(ResponseShape::ChoiceSingle),
            _ => None,
        }
    }

    fn from_direct(data: &Value) -> Option<ResponseShape> {
        if let Some(text) = message_content(data) {
            return Some(ResponseShape::DirectMessage(text));
        }
        ALTERNATIVE_FIELDS
            .iter()
            .find_map(|field| data.get(*field).and_then(non_empty))
            .map(ResponseShape::DirectMessage)
    }

    fn from_walk(data: &Value) -> Option<ResponseShape> {
        find_content_field(data, 0)
            .or_else(|| find_loose_text(data, 0))
            .map(ResponseShape::Unknown)
    }
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}

/// `message.content` on an object, tolerating `message` being a list
fn message_content(item: &Value) -> Option<String> {
    match item.get("message")? {
        Value::Array(messages) => messages
            .iter()
            .find_map(|m| m.get("content").and_then(non_empty)),
        message => message.get("content").and_then(non_empty),
    }
}

/// First non-empty string stored under a `content` key, depth first
fn find_content_field(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => map.iter().find_map(|(key, child)| {
            if key == "content" {
                if let Some(text) = non_empty(child) {
                    return Some(text);
                }
            }
            find_content_field(child, depth + 1)
        }),
        Value::Array(items) => items
            .iter()
            .find_map(|child| find_content_field(child, depth + 1)),
        _ => None,
    }
}

/// First reasonably long string that is not a URL, depth first
fn find_loose_text(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            let is_url = trimmed.starts_with("http://") || trimmed.starts_with("https://");
            (trimmed.chars().count() > MIN_LOOSE_CHARS && !is_url).then(|| trimmed.to_string())
        }
        Value::Object(map) => map
            .values()
            .find_map(|child| find_loose_text(child, depth + 1)),
        Value::Array(items) => items
            .iter()
            .find_map(|child| find_loose_text(child, depth + 1)),
        _ => None,
    }
}
