//! Compiled registration patterns and the arguments they capture.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    /// Match anywhere in the text.
    Search,
    /// The whole text must match.
    Exact,
}

/// A compiled pattern together with the text it was declared with.
///
/// Message patterns are searched anywhere in the message text; webhook
/// patterns must match the entire webhook id.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    key: String,
    regex: Regex,
    mode: MatchMode,
}

impl Pattern {
    /// Compiles a message pattern.
    pub fn message(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_owned(),
            key: source.to_owned(),
            regex: Regex::new(source)?,
            mode: MatchMode::Search,
        })
    }

    /// Compiles a message pattern that ignores letter case.
    pub fn message_case_insensitive(source: &str) -> Result<Self, regex::Error> {
        let key = format!("(?i){source}");
        Ok(Self {
            source: source.to_owned(),
            regex: Regex::new(&key)?,
            key,
            mode: MatchMode::Search,
        })
    }

    /// Compiles a webhook pattern, anchored at both ends.
    pub fn webhook(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_owned(),
            key: source.to_owned(),
            regex: Regex::new(&format!("^(?:{source})$"))?,
            mode: MatchMode::Exact,
        })
    }

    /// Compiles a command pattern: `source` at the start of the message,
    /// optionally followed by whitespace and an argument string. The
    /// arguments are captured by the last group.
    ///
    /// Anchors around `source` are dropped, so `^deploy$` still accepts
    /// arguments.
    pub fn command(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let flags = if case_insensitive { "(?is)" } else { "(?s)" };
        let body = strip_anchors(source);
        let key = format!(r"{flags}^(?:{body})(?:\s+(.*))?$");
        Ok(Self {
            source: source.to_owned(),
            regex: Regex::new(&key)?,
            key,
            mode: MatchMode::Search,
        })
    }

    /// The pattern text as declared by the plugin.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Routing key. Two registrations share a bucket iff their keys are equal.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_exact(&self) -> bool {
        self.mode == MatchMode::Exact
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Matches `text`, returning the captured groups on success.
    pub fn captures(&self, text: &str) -> Option<MatchArgs> {
        let caps = self.regex.captures(text)?;

        let groups = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_owned()))
            .collect();
        let named = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| Some((name.to_owned(), caps.name(name)?.as_str().to_owned())))
            .collect();

        Some(MatchArgs {
            matched: caps.get(0).map(|m| m.as_str().to_owned()).unwrap_or_default(),
            groups,
            named,
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Groups captured by a successful pattern match.
///
/// Positional groups are indexed from zero, so `get(0)` is the first
/// parenthesised group, not the whole match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchArgs {
    matched: String,
    groups: Vec<Option<String>>,
    named: BTreeMap<String, String>,
}

impl MatchArgs {
    /// The full matched text.
    pub fn matched(&self) -> &str {
        &self.matched
    }

    /// Positional group `index`, if it participated in the match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    /// Named group, if it participated in the match.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.groups.iter().map(Option::as_deref)
    }
}

/// Removes a leading `^` and an unescaped trailing `$`.
fn strip_anchors(source: &str) -> &str {
    let body = source.strip_prefix('^').unwrap_or(source);
    match body.strip_suffix('$') {
        Some(rest) if rest.chars().rev().take_while(|&c| c == '\\').count() % 2 == 0 => rest,
        _ => body,
    }
}
