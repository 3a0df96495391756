//! Presentation metadata and `$placeholder` expansion.

use serde::Serialize;
use std::collections::BTreeMap;

/// Keys every presentation carries, with their initial values.
const DEFAULTS: &[(&str, &str)] = &[
    ("title", ""),
    ("subtitle", ""),
    ("authors", ""),
    ("authors_short", ""),
    ("emails", ""),
    ("affiliations", ""),
    ("affiliations_short", ""),
    ("logo", ""),
    ("location", ""),
    ("location_short", ""),
    ("date", ""),
    ("conference", ""),
    ("conference_short", ""),
    ("session", ""),
    ("session_short", ""),
    ("max_time", "25"),
    ("total_slides_number", ""),
];

/// Global `---metadata` values. Later blocks overwrite earlier ones per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    values: BTreeMap<String, String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the pairs of one metadata block.
    pub fn apply(&mut self, pairs: &[(String, String)]) {
        for (key, value) in pairs {
            if !DEFAULTS.iter().any(|(k, _)| k == key) {
                log::debug!("custom metadata key `{key}`");
            }
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Raw value as written.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value prepared for display: list values `[a, b]` join with `, `.
    pub fn display(&self, key: &str) -> Option<String> {
        self.get(key).map(display_value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// `['Ada', "Grace"]` → `Ada, Grace`; scalars pass through trimmed.
fn display_value(raw: &str) -> String {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) else {
        return raw.to_string();
    };
    inner
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"'))
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-slide placeholder values (`slidetitle`, `sectionnumber`, ...).
#[derive(Debug, Clone, Default)]
pub struct SlideContext {
    values: BTreeMap<&'static str, String>,
}

impl SlideContext {
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Replace `$key` tokens with slide context values, then metadata values.
/// Unknown tokens are left verbatim.
pub fn expand_placeholders(text: &str, metadata: &Metadata, context: &SlideContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let key = &after[..len];
        let value = match context.get(key) {
            Some(v) => Some(v.to_string()),
            None if !key.is_empty() => metadata.display(key),
            None => None,
        };
        match value {
            Some(v) => out.push_str(&v),
            None => {
                out.push('$');
                out.push_str(key);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}
