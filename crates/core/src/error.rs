//! Errors raised while loading configuration and touching local storage
//!
//! Each [`Error`] carries a stable [`ErrorCode`], the chain of operations that
//! were in progress when it happened, and optionally a hint for the user.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Broad grouping of error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Bugs and invariant violations
    Internal,
    /// Filesystem access
    Io,
    /// `leadflow.toml` and environment overrides
    Config,
    /// Persisted credentials
    Storage,
}

/// Stable error codes, rendered as `LF-<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// Unexpected internal failure
    Internal,
    /// Generic I/O failure
    Io,
    /// A file that should exist does not
    NotFound,
    /// The process may not read or write a file
    PermissionDenied,
    /// An explicitly requested config file is missing
    ConfigNotFound,
    /// A config file is not valid TOML or does not match the schema
    ConfigParse,
    /// A setting has an unusable value
    ConfigValue,
    /// Credential storage failed
    Storage,
    /// Stored credentials could not be decoded
    StorageCorrupted,
}

impl ErrorCode {
    /// Numeric code
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Internal => 1000,
            Self::Io => 2000,
            Self::NotFound => 2001,
            Self::PermissionDenied => 2002,
            Self::ConfigNotFound => 3001,
            Self::ConfigParse => 3002,
            Self::ConfigValue => 3003,
            Self::Storage => 4000,
            Self::StorageCorrupted => 4001,
        }
    }

    /// Category the code belongs to
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::Internal => ErrorCategory::Internal,
            Self::Io | Self::NotFound | Self::PermissionDenied => ErrorCategory::Io,
            Self::ConfigNotFound | Self::ConfigParse | Self::ConfigValue => ErrorCategory::Config,
            Self::Storage | Self::StorageCorrupted => ErrorCategory::Storage,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LF-{}", self.code())
    }
}

/// Core error type
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Operations in progress, innermost first
    pub context: Vec<String>,
    /// What the user can do about it
    pub hint: Option<String>,
    /// Underlying error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        for step in &self.context {
            write!(f, "\n  while: {step}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
            hint: None,
            source: None,
        }
    }

    /// Record the operation that was in progress
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attach a hint for the user
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach the underlying error
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Category of this error's code
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// An explicitly requested config file is missing
    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
        .with_hint("Create a leadflow.toml file or pass --config to specify a path")
    }

    /// A setting could not be parsed
    pub fn invalid_value(key: &str, value: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ConfigValue, format!("Invalid value for {key}: {value}"))
    }

    /// Credential storage failed
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Storage, message)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::Io,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorCode::StorageCorrupted, format!("Invalid JSON: {err}")).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParse, format!("Invalid TOML: {err}")).with_source(err)
    }
}

/// Extension trait for annotating core results
pub trait ResultExt<T> {
    /// Record the operation that was in progress
    fn context(self, context: impl Into<String>) -> Result<T>;
    /// Attach a hint for the user
    fn hint(self, hint: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn hint(self, hint: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_hint(hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_rendering() {
        assert_eq!(ErrorCode::NotFound.to_string(), "LF-2001");
        assert_eq!(ErrorCode::Storage.to_string(), "LF-4000");
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::PermissionDenied.category(), ErrorCategory::Io);
        assert_eq!(ErrorCode::ConfigParse.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::StorageCorrupted.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_context_chain_and_hint() {
        let err = Error::config_not_found("/etc/leadflow.toml")
            .with_context("loading client settings")
            .with_context("starting the CLI");

        assert_eq!(err.code, ErrorCode::ConfigNotFound);
        assert_eq!(err.context.len(), 2);

        let rendered = err.to_string();
        assert!(rendered.starts_with("[LF-3001]"));
        assert!(rendered.contains("while: loading client settings"));
        assert!(rendered.contains("hint: Create a leadflow.toml"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: Error = io.into();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::storage("disk full"));
        let err = result.context("saving tokens").hint("free some space").unwrap_err();
        assert_eq!(err.context, vec!["saving tokens".to_string()]);
        assert_eq!(err.hint.as_deref(), Some("free some space"));
        assert_eq!(err.category(), ErrorCategory::Storage);
    }
}
