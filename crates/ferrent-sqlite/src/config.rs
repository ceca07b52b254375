//! Driver settings.

use std::time::Duration;

use ferrent_orm::DatabaseConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Settings of a [`SqliteDriver`](crate::SqliteDriver).
///
/// Deserializes from any serde source; missing keys take their default.
///
/// ```
/// use ferrent_sqlite::SqliteConfig;
///
/// let config: SqliteConfig =
///     serde_json::from_str(r#"{ "url": "sqlite://zoo.db", "max_connections": 4 }"#).unwrap();
/// assert_eq!(config.max_connections, 4);
/// assert!(config.foreign_keys);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Connection URL, e.g. `sqlite://zoo.db` or `sqlite::memory:`.
    pub url: String,
    /// Pool size. In-memory databases always use a single connection.
    pub max_connections: u32,
    /// Log every statement at debug level.
    pub log_queries: bool,
    /// Statements slower than this many milliseconds are logged at warn
    /// level.
    pub slow_query_ms: Option<u64>,
    /// Enforce foreign keys.
    pub foreign_keys: bool,
    /// Statements run on every new connection.
    pub init_statements: Vec<String>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            log_queries: false,
            slow_query_ms: None,
            foreign_keys: true,
            init_statements: Vec::new(),
        }
    }
}

impl SqliteConfig {
    /// A config for the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// A private in-memory database.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Reads `DATABASE_URL`, `FERRENT_MAX_CONNECTIONS` and
    /// `FERRENT_LOG_QUERIES`. Unset variables keep their default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup("DATABASE_URL") {
            config.url = url;
        }
        if let Some(value) = lookup("FERRENT_MAX_CONNECTIONS") {
            config.max_connections = value
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidEnv {
                    name: "FERRENT_MAX_CONNECTIONS",
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup("FERRENT_LOG_QUERIES") {
            config.log_queries = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
                name: "FERRENT_LOG_QUERIES",
                value,
            })?;
        }
        Ok(config)
    }

    /// Enables statement logging.
    #[must_use]
    pub const fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Adds a statement run on every new connection.
    #[must_use]
    pub fn init_statement(mut self, sql: impl Into<String>) -> Self {
        self.init_statements.push(sql.into());
        self
    }

    /// Whether the URL points at an in-memory database.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub(crate) fn database_config(&self) -> DatabaseConfig {
        let mut config = DatabaseConfig::default().log_queries(self.log_queries);
        if let Some(ms) = self.slow_query_ms {
            config = config.slow_query_threshold(Duration::from_millis(ms));
        }
        config.init_statements.clone_from(&self.init_statements);
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SqliteConfig::default();
        assert!(config.is_memory());
        assert_eq!(config.max_connections, 5);
        assert!(config.foreign_keys);
        assert!(!config.log_queries);
    }

    #[test]
    fn test_from_env_values() {
        let config = SqliteConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://zoo.db?mode=rwc"),
            ("FERRENT_MAX_CONNECTIONS", "8"),
            ("FERRENT_LOG_QUERIES", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.url, "sqlite://zoo.db?mode=rwc");
        assert_eq!(config.max_connections, 8);
        assert!(config.log_queries);
        assert!(!config.is_memory());
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        let err = SqliteConfig::from_lookup(lookup(&[("FERRENT_MAX_CONNECTIONS", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "FERRENT_MAX_CONNECTIONS",
                ..
            }
        ));
        let err = SqliteConfig::from_lookup(lookup(&[("FERRENT_MAX_CONNECTIONS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
        let err =
            SqliteConfig::from_lookup(lookup(&[("FERRENT_LOG_QUERIES", "loud")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "FERRENT_LOG_QUERIES",
                ..
            }
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SqliteConfig =
            serde_json::from_str(r#"{ "log_queries": true, "slow_query_ms": 250 }"#).unwrap();
        assert!(config.log_queries);
        assert!(config.is_memory());
        let db = config.database_config();
        assert_eq!(db.slow_query_threshold, Some(Duration::from_millis(250)));
    }
}
