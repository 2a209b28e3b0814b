//! Update-ignore patterns.
//!
//! A pak may list glob patterns for files that an in-place update must not
//! overwrite (user configuration, save data). `*` and `?` never cross a `/`.
//! A pattern matches an archive entry when it matches the whole entry path or
//! any leading run of its segments, e.g. `saves` matches `saves/slot1.dat`.
//! Prefix expansion stops below a segment ending in `.pak` so that a pattern
//! written for the outer bundle does not reach into a nested pak directory.

use glob::{MatchOptions, Pattern};
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    /// Compile `raw` patterns; invalid patterns are logged and dropped.
    #[must_use]
    pub fn new<S: AsRef<str>>(raw: &[S]) -> Self {
        let patterns = raw
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern.as_ref()) {
                Ok(compiled) => Some(compiled),
                Err(err) => {
                    warn!(pattern = pattern.as_ref(), error = %err, "ignoring invalid update-ignore pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn is_ignored(&self, entry: &str) -> bool {
        let entry = entry.trim_end_matches('/');
        self.patterns.iter().any(|pattern| {
            pattern.matches_with(entry, MATCH_OPTIONS) || prefix_matches(pattern, entry)
        })
    }
}

fn prefix_matches(pattern: &Pattern, entry: &str) -> bool {
    let parts: Vec<&str> = entry.split('/').collect();
    for idx in 0..parts.len() {
        if idx > 0 && parts[idx - 1].ends_with(".pak") {
            break;
        }
        let partial = parts[..=idx].join("/");
        if pattern.matches_with(&partial, MATCH_OPTIONS) {
            return true;
        }
    }
    false
}
