//! Entity name cleaning.
//!
//! Asset names exported from investing.com style downloads carry a
//! "Datos históricos de " / "Historical data for " prefix and a trailing
//! exchange annotation in parentheses. Both are stripped so that names from
//! different result files join on the same key.

use serde::{Deserialize, Serialize};

/// Prefixes stripped from entity names by default.
pub const DEFAULT_PREFIXES: &[&str] = &["Datos históricos de ", "Historical data for "];

/// Cleans raw entity names into display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCleaner {
    prefixes: Vec<String>,
}

impl Default for EntityCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIXES.iter().map(|p| (*p).to_string()).collect())
    }
}

impl EntityCleaner {
    /// Create a cleaner stripping the given prefixes (matched case-insensitively).
    pub const fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Prefixes this cleaner strips.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Clean a single name.
    ///
    /// Applies prefix removal, parenthetical removal and trimming until the
    /// string stops changing, so `clean(clean(x)) == clean(x)` for every input.
    pub fn clean(&self, raw: &str) -> String {
        let mut current = raw.trim().to_string();
        loop {
            let next = self.clean_once(&current);
            if next == current {
                return next;
            }
            current = next;
        }
    }

    fn clean_once(&self, name: &str) -> String {
        let mut out = name.trim();
        for prefix in &self.prefixes {
            let prefix = prefix.trim_end();
            if let Some(rest) = strip_prefix_ignore_case(out, prefix)
                && ends_word(prefix, rest)
            {
                out = rest.trim_start();
            }
        }
        strip_parenthetical(out).trim().to_string()
    }
}

/// Remove a case-insensitive prefix, respecting char boundaries.
fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let mut s_chars = s.char_indices();
    for p in prefix.chars() {
        let (_, c) = s_chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    let rest_start = s_chars.next().map_or(s.len(), |(idx, _)| idx);
    Some(&s[rest_start..])
}

/// A prefix ending in a letter or digit must be followed by whitespace or
/// nothing, so "for" does not match the start of "forward".
fn ends_word(prefix: &str, rest: &str) -> bool {
    !prefix.ends_with(char::is_alphanumeric)
        || rest.is_empty()
        || rest.starts_with(char::is_whitespace)
}

/// Drop a " (...)" annotation: from the first " (" to the last ")" after it.
fn strip_parenthetical(s: &str) -> String {
    let Some(open) = s.find(" (") else {
        return s.to_string();
    };
    match s.rfind(')') {
        // Require at least one character inside the parentheses.
        Some(close) if close > open + 2 => {
            let mut out = String::with_capacity(s.len());
            out.push_str(&s[..open]);
            out.push_str(&s[close + 1..]);
            out
        }
        _ => s.to_string(),
    }
}
