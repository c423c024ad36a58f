//! Connection-string sources
//!
//! The SQL connection string may come from several environment variables.
//! They are checked in priority order and the first non-empty value wins.

use std::env;

/// Environment variables consulted for the SQL connection string, highest
/// priority first.
pub const SQL_CONNECTION_VARS: &[&str] = &[
    "AZURE_SQL_CONNECTION_STRING",
    "SQL_CONNECTION_STRING",
    "DATABASE_URL",
];

/// Prioritized list of named connection-string candidates
#[derive(Debug, Clone, Default)]
pub struct ConnectionSources {
    candidates: Vec<(String, Option<String>)>,
}

impl ConnectionSources {
    /// Snapshot the recognized environment variables
    pub fn from_env() -> Self {
        Self::from_vars(SQL_CONNECTION_VARS)
    }

    /// Snapshot an explicit list of environment variables
    pub fn from_vars(names: &[&str]) -> Self {
        let candidates = names
            .iter()
            .map(|name| (name.to_string(), env::var(name).ok()))
            .collect();
        Self { candidates }
    }

    /// Build from explicit (name, value) pairs (for testing)
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, Option<V>)>,
        N: Into<String>,
        V: Into<String>,
    {
        let candidates = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.map(Into::into)))
            .collect();
        Self { candidates }
    }

    /// Single literal connection string, e.g. from a CLI flag
    pub fn literal(value: impl Into<String>) -> Self {
        Self::from_pairs([("literal", Some(value.into()))])
    }

    /// Put `value` ahead of every other candidate
    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.candidates.insert(0, (name.into(), Some(value.into())));
        self
    }

    /// First non-empty candidate, with the name of the source it came from
    pub fn resolve(&self) -> Option<(&str, &str)> {
        self.candidates.iter().find_map(|(name, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (name.as_str(), v))
        })
    }

    /// Names of all candidates, in priority order
    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_empty_wins() {
        let sources = ConnectionSources::from_pairs([
            ("A", None),
            ("B", Some("   ")),
            ("C", Some("postgres://c")),
            ("D", Some("postgres://d")),
        ]);

        assert_eq!(sources.resolve(), Some(("C", "postgres://c")));
    }

    #[test]
    fn nothing_configured() {
        let sources = ConnectionSources::from_pairs([("A", None), ("B", Some(""))]);
        assert!(sources.resolve().is_none());
        assert_eq!(sources.names(), vec!["A", "B"]);
    }

    #[test]
    fn override_takes_priority() {
        let sources = ConnectionSources::from_pairs([("DATABASE_URL", Some("postgres://env"))])
            .with_override("--database-url", "postgres://flag");

        assert_eq!(sources.resolve(), Some(("--database-url", "postgres://flag")));
    }
}
