//! Key splitters for batch operations whose key field is a delimited string.
use crate::error::{AssemblyError, AssemblyResult};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Splitter used when an operation names none.
pub const DEFAULT_SPLITTER: &str = "comma";

/// Turns a single key string into its raw key tokens.
pub trait KeySplitter: Send + Sync {
    fn split(&self, raw: &str) -> Vec<String>;
}

/// Splits on a literal delimiter, trimming tokens and dropping empty ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterSplitter {
    delimiter: String,
}

impl DelimiterSplitter {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl KeySplitter for DelimiterSplitter {
    fn split(&self, raw: &str) -> Vec<String> {
        if self.delimiter.is_empty() {
            return tokens(std::iter::once(raw));
        }
        tokens(raw.split(self.delimiter.as_str()))
    }
}

/// Splits on every match of a regular expression.
#[derive(Debug, Clone)]
pub struct PatternSplitter {
    pattern: Regex,
}

impl PatternSplitter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl KeySplitter for PatternSplitter {
    fn split(&self, raw: &str) -> Vec<String> {
        tokens(self.pattern.split(raw))
    }
}

fn tokens<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splitters addressable by id from configuration.
#[derive(Clone)]
pub struct SplitterRegistry {
    splitters: HashMap<String, Arc<dyn KeySplitter>>,
}

impl SplitterRegistry {
    /// A registry with no splitters at all.
    pub fn empty() -> Self {
        Self {
            splitters: HashMap::new(),
        }
    }

    pub fn register<S>(&mut self, id: impl Into<String>, splitter: S)
    where
        S: KeySplitter + 'static,
    {
        self.splitters.insert(id.into(), Arc::new(splitter));
    }

    pub fn with<S>(mut self, id: impl Into<String>, splitter: S) -> Self
    where
        S: KeySplitter + 'static,
    {
        self.register(id, splitter);
        self
    }

    /// Look up `id`, or the default splitter when `id` is `None`.
    pub fn get(&self, id: Option<&str>) -> AssemblyResult<Arc<dyn KeySplitter>> {
        let id = id.unwrap_or(DEFAULT_SPLITTER);
        self.splitters
            .get(id)
            .cloned()
            .ok_or_else(|| AssemblyError::UnknownSplitter(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.splitters.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.splitters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for SplitterRegistry {
    fn default() -> Self {
        let whitespace = PatternSplitter::new(r"\s+");
        let mut registry = Self::empty()
            .with(DEFAULT_SPLITTER, DelimiterSplitter::new(","))
            .with("semicolon", DelimiterSplitter::new(";"))
            .with("pipe", DelimiterSplitter::new("|"));
        match whitespace {
            Ok(splitter) => registry.register("whitespace", splitter),
            Err(err) => tracing::warn!(error = %err, "whitespace splitter unavailable"),
        }
        registry
    }
}

impl fmt::Debug for SplitterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitterRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_splitter_trims_and_drops_empty_tokens() {
        let splitter = DelimiterSplitter::new(",");
        assert_eq!(splitter.split(" 1, 2,,3 ,"), vec!["1", "2", "3"]);
        assert!(splitter.split("  ").is_empty());
    }

    #[test]
    fn pattern_splitter_splits_on_regex() {
        let splitter = PatternSplitter::new(r"[;|]").expect("valid regex");
        assert_eq!(splitter.split("a;b| c"), vec!["a", "b", "c"]);
        assert!(PatternSplitter::new("(").is_err());
    }

    #[test]
    fn default_registry_has_builtin_ids() {
        let registry = SplitterRegistry::default();
        assert_eq!(registry.ids(), vec!["comma", "pipe", "semicolon", "whitespace"]);
        let default = registry.get(None).expect("default splitter");
        assert_eq!(default.split("1,2"), vec!["1", "2"]);
        let whitespace = registry.get(Some("whitespace")).unwrap();
        assert_eq!(whitespace.split("a  b\tc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_splitter_is_reported_by_id() {
        let registry = SplitterRegistry::empty();
        match registry.get(Some("tab")) {
            Err(err) => assert_eq!(err, AssemblyError::UnknownSplitter("tab".to_string())),
            Ok(_) => panic!("expected unknown splitter"),
        }
        assert!(registry.get(None).is_err());
    }
}
