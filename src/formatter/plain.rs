//! Plain-text context formatter with truncation and key redaction.

use super::Formatter;
use crate::core::{FrozenMap, OrderedMap};
use crate::utils::config::{MAX_FORMATTED_STRING, REDACTED_KEY_PATTERNS};
use serde_json::Value;

/// Type-tagged plain text, e.g. `(integer: 3)` or `(string: users)`.
///
/// Strings longer than `max_string` bytes are cut and suffixed with
/// `<truncated(n)>`. Values under credential-like keys are replaced by
/// `<redacted(key)>`.
#[derive(Debug, Clone)]
pub struct PlainFormatter {
    max_string: usize,
    redacted: Vec<String>,
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self {
            max_string: MAX_FORMATTED_STRING,
            redacted: REDACTED_KEY_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_string(mut self, max_string: usize) -> Self {
        self.max_string = max_string;
        self
    }

    /// Also redact keys containing `pattern` (case-insensitive)
    pub fn with_redacted_key(mut self, pattern: impl Into<String>) -> Self {
        self.redacted.push(pattern.into().to_lowercase());
        self
    }

    pub fn is_redacted(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.redacted.iter().any(|pattern| key.contains(pattern.as_str()))
    }

    fn truncate(&self, text: &str) -> String {
        if text.len() <= self.max_string {
            return text.to_string();
        }
        let mut cut = self.max_string;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}<truncated({})>", &text[..cut], text.len() - cut)
    }

    /// Single value, nested containers summarized by size
    fn scalar(&self, value: &Value) -> String {
        match value {
            Value::Null => "(null)".to_string(),
            Value::Bool(flag) => format!("(boolean: {})", flag),
            Value::Number(number) if number.is_f64() => format!("(float: {})", number),
            Value::Number(number) => format!("(integer: {})", number),
            Value::String(text) => format!("(string: {})", self.truncate(text)),
            Value::Array(items) => format!("(array: size={})", items.len()),
            Value::Object(fields) => format!("(array: size={})", fields.len()),
        }
    }

    fn container<'a>(&self, size: usize, items: impl Iterator<Item = (String, &'a Value)>) -> String {
        let lines: Vec<String> = items
            .map(|(key, value)| {
                if self.is_redacted(&key) {
                    format!("[{}] => <redacted({})>", key, key)
                } else {
                    format!("[{}] => {}", key, self.scalar(value))
                }
            })
            .collect();
        if lines.is_empty() {
            return format!("array: (size={})", size);
        }
        format!("array: (size={})\n{}", size, lines.join("\n"))
    }

    /// Format one context entry
    pub fn format_value(&self, key: &str, value: &Value) -> String {
        match value {
            Value::Array(items) => self.container(
                items.len(),
                items.iter().enumerate().map(|(i, v)| (i.to_string(), v)),
            ),
            Value::Object(fields) => {
                self.container(fields.len(), fields.iter().map(|(k, v)| (k.clone(), v)))
            }
            _ if self.is_redacted(key) => format!("<redacted({})>", key),
            _ => self.scalar(value),
        }
    }
}

impl Formatter for PlainFormatter {
    fn format(&self, context: &FrozenMap<String, Value>) -> OrderedMap<String, String> {
        context
            .iter()
            .map(|(key, value)| (key.clone(), self.format_value(key, value)))
            .collect()
    }
}
