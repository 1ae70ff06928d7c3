//! Canonical key-value form
//!
//! Each pair is written as `key:value\n`. There is no escaping: keys must
//! not contain `:` and neither side may contain a line break.

use std::fmt;

/// Ordered key-value pairs in canonical form.
///
/// Insertion order is preserved on output, which matters for signing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvForm {
    pairs: Vec<(String, String)>,
}

impl KvForm {
    pub fn new() -> Self {
        KvForm { pairs: Vec::new() }
    }

    /// Append a pair, replacing the value of an existing key in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse the canonical text form.
    ///
    /// The payload is trimmed, split on `\n`, and each line split on its
    /// first colon with both halves trimmed. Lines without a colon are
    /// skipped, so callers that need strict validation must check the
    /// resulting field count themselves.
    pub fn parse(text: &str) -> Self {
        let mut form = KvForm::new();
        for line in text.trim().split('\n') {
            match line.split_once(':') {
                Some((k, v)) => form.insert(k.trim(), v.trim()),
                None => tracing::trace!(line, "skipping kvform line without separator"),
            }
        }
        form
    }

    /// Emit the canonical text form
    pub fn encode(&self) -> String {
        kv_text(self.iter())
    }
}

impl fmt::Display for KvForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KvForm {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = KvForm::new();
        for (k, v) in iter {
            form.insert(k, v);
        }
        form
    }
}

/// Build `key:value\n` lines in iteration order.
pub fn kv_text<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut text = String::new();
    for (k, v) in pairs {
        text.push_str(k);
        text.push(':');
        text.push_str(v);
        text.push('\n');
    }
    text
}
