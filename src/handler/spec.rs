//! Handler identifier parsing.
//!
//! A handler identifier names the callable to run for every invocation:
//!
//! ```text
//! FILE.METHOD          e.g. app.handler
//! FILE.CLASS.METHOD    e.g. app.Orders.create
//! ```
//!
//! Any other number of segments, or an empty segment, is rejected when the
//! identifier is parsed, before the first invocation.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Parsed handler identifier. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    identifier: String,
    file: String,
    namespace: Option<String>,
    method: String,
}

impl HandlerSpec {
    /// Parse `FILE.METHOD` or `FILE.CLASS.METHOD`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHandler`] for any other shape.
    pub fn parse(handler: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidHandler(handler.to_string());

        let segments: Vec<&str> = handler.split('.').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid());
        }

        let (file, namespace, method) = match segments.as_slice() {
            [file, method] => (*file, None, *method),
            [file, class, method] => (*file, Some(class.to_string()), *method),
            _ => return Err(invalid()),
        };

        Ok(Self {
            identifier: handler.to_string(),
            file: file.to_string(),
            namespace,
            method: method.to_string(),
        })
    }

    /// Full identifier as configured; used as the registry key.
    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Class segment, present for class-level dispatch.
    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl FromStr for HandlerSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}
