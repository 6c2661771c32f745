//! Help text from doc comments.
//!
//! Reads the prose of a doc comment as the command description, its first
//! paragraph as the one-line summary, and reST-style field lines as
//! per-parameter help:
//!
//! ```text
//! Adds two numbers.
//!
//! :param a: the first term
//! :param float b: the second term,
//!     continued on an indented line
//! ```

use std::collections::BTreeMap;
use tracing::trace;

/// Parsed documentation for one callable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocInfo {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl DocInfo {
    pub fn parse(doc: &str) -> Self {
        let mut prose: Vec<&str> = Vec::new();
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        let mut current: Option<String> = None;
        let mut in_fields = false;

        for line in doc.lines() {
            let trimmed = line.trim();

            if let Some(field) = trimmed.strip_prefix(':') {
                in_fields = true;
                current = None;
                let Some((header, text)) = field.split_once(':') else {
                    continue;
                };
                let mut words = header.split_whitespace();
                if words.next() != Some("param") {
                    continue;
                }
                if let Some(name) = words.last() {
                    params.insert(name.to_string(), text.trim().to_string());
                    current = Some(name.to_string());
                }
                continue;
            }

            if in_fields {
                let continues = line.starts_with(char::is_whitespace) && !trimmed.is_empty();
                match (&current, continues) {
                    (Some(name), true) => {
                        if let Some(text) = params.get_mut(name) {
                            if !text.is_empty() {
                                text.push(' ');
                            }
                            text.push_str(trimmed);
                        }
                    }
                    _ => current = None,
                }
                continue;
            }

            prose.push(trimmed);
        }

        let description = prose.join("\n").trim().to_string();
        let summary = description
            .split("\n\n")
            .next()
            .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty());

        trace!(params = params.len(), "parsed doc info");

        Self {
            summary,
            description: (!description.is_empty()).then_some(description),
            params,
        }
    }

    /// Help text for the named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}
