//! Tag parser
//!
//! Parsing is permissive and never fails. For each opening tag `<NAME>` the
//! rest of the text is searched for the first `</NAME>`; nesting is not
//! balanced, so a value containing its own `<NAME>` ends at the inner closer.
//! Values are kept as opaque text and may be parsed again by the caller.

use std::collections::HashMap;

/// Value recorded for a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    /// `<NAME>` with no matching `</NAME>` later in the text.
    Present,
    /// Text between `<NAME>` and the first following `</NAME>`.
    Value(String),
}

impl TagValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Present => None,
            TagValue::Value(value) => Some(value),
        }
    }
}

/// Top-level tags of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: HashMap<String, TagValue>,
}

impl Tags {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.entries.get(name)
    }

    /// Raw value of `name`, if it was closed.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(TagValue::as_str)
    }

    /// Trimmed value of `name`; `None` when absent, unclosed or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Parses the value of `name` as a nested tag list.
    pub fn nested(&self, name: &str) -> Tags {
        self.value(name).map(parse_tags).unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses the top-level tags of `text`. Later duplicates replace earlier ones.
pub fn parse_tags(text: &str) -> Tags {
    let mut tags = Tags::default();
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('>') else {
            break;
        };
        let name = &after_open[..close];
        let body = &after_open[close + 1..];

        // Stray closers and empty brackets carry nothing.
        if name.is_empty() || name.starts_with('/') {
            rest = body;
            continue;
        }

        let closer = format!("</{}>", name);
        match body.find(&closer) {
            Some(end) => {
                tags.entries
                    .insert(name.to_string(), TagValue::Value(body[..end].to_string()));
                rest = &body[end + closer.len()..];
            }
            None => {
                tags.entries.insert(name.to_string(), TagValue::Present);
                rest = body;
            }
        }
    }

    tags
}

/// Every value of `name` at any depth, in order of appearance.
///
/// Used for repeated fields such as the station list of a roster reply,
/// where [`parse_tags`] would keep only the last occurrence.
pub fn tag_values(text: &str, name: &str) -> Vec<String> {
    let opener = format!("<{}>", name);
    let closer = format!("</{}>", name);
    let mut values = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&opener) {
        let body = &rest[start + opener.len()..];
        let Some(end) = body.find(&closer) else {
            break;
        };
        values.push(body[..end].to_string());
        rest = &body[end + closer.len()..];
    }

    values
}
