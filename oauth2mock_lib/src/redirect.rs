//! Redirect URI patterns with `*` wildcards.
//!
//! A pattern is matched literally except for `*`, which stands for any run
//! of characters (including `/`). The match is anchored at both ends.

use regex::Regex;

use crate::Error;

/// A compiled redirect URI pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        let escaped = regex::escape(pattern).replace(r"\*", ".*");
        let regex = Regex::new(&format!("^{escaped}$"))?;
        Ok(Self { source: pattern.to_owned(), regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, uri: &str) -> bool {
        self.regex.is_match(uri)
    }
}

/// One-shot form of [`WildcardPattern::is_match`].
pub fn matches_wildcard(pattern: &str, uri: &str) -> Result<bool, Error> {
    Ok(WildcardPattern::new(pattern)?.is_match(uri))
}
