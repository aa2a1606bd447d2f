//! Runtime configuration.
//!
//! The host passes the runtime API address and the handler identifier through
//! the environment. [`RuntimeConfig::from_env`] reads both; the fluent setters
//! override individual values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use lambda_runtime_client::RuntimeConfig;
//!
//! let config = RuntimeConfig::new("127.0.0.1:9001", "app.handler")
//!     .poll_timeout(Duration::from_secs(60));
//!
//! assert_eq!(config.api_version, "2018-06-01");
//! assert_eq!(config.poll_timeout, Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the runtime API `host:port`.
pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

/// Environment variable holding the handler identifier.
pub const HANDLER_ENV: &str = "_HANDLER";

/// Runtime API version path segment.
pub const DEFAULT_API_VERSION: &str = "2018-06-01";

/// Read timeout for the next-invocation long poll.
///
/// The host holds the connection open until work exists, so this is
/// effectively unbounded while still being finite.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1_000_000);

/// Configuration for a runtime process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Runtime API address (`host:port`).
    pub runtime_api: String,
    /// Handler identifier (`FILE.METHOD` or `FILE.CLASS.METHOD`).
    pub handler: String,
    /// API version path segment.
    pub api_version: String,
    /// Timeout for the next-invocation request.
    pub poll_timeout: Duration,
}

impl RuntimeConfig {
    /// Create a configuration with default version and timeout.
    pub fn new(runtime_api: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            runtime_api: runtime_api.into(),
            handler: handler.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if `AWS_LAMBDA_RUNTIME_API` or
    /// `_HANDLER` is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_handler(None)
    }

    /// Load configuration from the environment, preferring `handler` over
    /// `_HANDLER` when given (e.g. from the first command-line argument).
    pub fn from_env_with_handler(handler: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(handler, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(handler: Option<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let runtime_api = non_empty(RUNTIME_API_ENV).ok_or(ConfigError::MissingEnv(RUNTIME_API_ENV))?;
        let handler = handler
            .filter(|h| !h.is_empty())
            .or_else(|| non_empty(HANDLER_ENV))
            .ok_or(ConfigError::MissingEnv(HANDLER_ENV))?;

        Ok(Self::new(runtime_api, handler))
    }

    /// Replace the handler identifier.
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    /// Set the API version path segment.
    ///
    /// Default: `2018-06-01`
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the next-invocation timeout.
    ///
    /// Default: 1,000,000 seconds
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_new_defaults() {
        let config = RuntimeConfig::new("localhost:9001", "app.handler");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.poll_timeout, DEFAULT_POLL_TIMEOUT);
        assert_eq!(config.runtime_api, "localhost:9001");
    }

    #[test]
    fn test_from_lookup() {
        let config = RuntimeConfig::from_lookup(
            None,
            env(&[(RUNTIME_API_ENV, "127.0.0.1:9001"), (HANDLER_ENV, "app.handler")]),
        )
        .unwrap();

        assert_eq!(config.runtime_api, "127.0.0.1:9001");
        assert_eq!(config.handler, "app.handler");
    }

    #[test]
    fn test_handler_argument_takes_precedence() {
        let config = RuntimeConfig::from_lookup(
            Some("cli.Override.run".to_string()),
            env(&[(RUNTIME_API_ENV, "127.0.0.1:9001"), (HANDLER_ENV, "app.handler")]),
        )
        .unwrap();

        assert_eq!(config.handler, "cli.Override.run");
    }

    #[test]
    fn test_missing_runtime_api() {
        let err = RuntimeConfig::from_lookup(None, env(&[(HANDLER_ENV, "app.handler")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(RUNTIME_API_ENV)));
    }

    #[test]
    fn test_empty_handler_is_missing() {
        let err = RuntimeConfig::from_lookup(
            Some(String::new()),
            env(&[(RUNTIME_API_ENV, "127.0.0.1:9001"), (HANDLER_ENV, "")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(HANDLER_ENV)));
    }

    #[test]
    fn test_setters() {
        let config = RuntimeConfig::new("host:1", "a.b")
            .with_handler("c.D.e")
            .api_version("2099-01-01")
            .poll_timeout(Duration::from_secs(5));

        assert_eq!(config.handler, "c.D.e");
        assert_eq!(config.api_version, "2099-01-01");
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
    }
}
