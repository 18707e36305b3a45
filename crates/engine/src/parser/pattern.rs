//! Compiled regular expressions for `=~` / `!~` comparisons.

use std::fmt;

use regex_lite::Regex;

use super::ParseError;

/// A regex compiled once at parse time. Compares equal by source text.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let regex = Regex::new(source).map_err(|_| ParseError::malformed("pattern", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Pattern matching exactly one of `options`, literally.
    pub fn one_of<S: AsRef<str>>(options: &[S]) -> Result<Self, ParseError> {
        let alternatives: Vec<String> = options
            .iter()
            .map(|option| regex_lite::escape(option.as_ref()))
            .collect();
        Self::new(&format!("^({})$", alternatives.join("|")))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
