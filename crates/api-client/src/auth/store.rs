//! Credential persistence
//!
//! A [`TokenStore`] only saves, loads and clears the token pair. It never talks
//! to the network; refresh logic lives in the coordinator.

use leadflow_core::error::{Error, ErrorCode, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Access/refresh credential pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Bearer token attached to requests
    pub access_token: String,
    /// Token exchanged for a new pair when the access token is rejected
    pub refresh_token: String,
}

impl TokenPair {
    /// Create a new token pair
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens are secrets; keep them out of logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Durable storage for the current token pair
pub trait TokenStore: Send + Sync {
    /// Persist `pair`, replacing whatever was stored
    fn save(&self, pair: &TokenPair) -> Result<()>;

    /// Load the stored pair, `None` when nothing is stored
    fn load(&self) -> Result<Option<TokenPair>>;

    /// Remove any stored pair
    fn clear(&self) -> Result<()>;
}

/// In-memory store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `pair`
    #[must_use]
    pub fn with_tokens(pair: TokenPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, pair: &TokenPair) -> Result<()> {
        *self.pair.lock().unwrap_or_else(PoisonError::into_inner) = Some(pair.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.pair.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file holding the two storage keys
///
/// ```json
/// { "access_token": "...", "refresh_token": "..." }
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store credentials at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store credentials in the platform data directory
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(default_token_path())
    }

    /// Location of the credentials file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<data dir>/leadflow/credentials.json`, relative to the working directory
/// when the platform has no data dir.
#[must_use]
pub fn default_token_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leadflow")
        .join("credentials.json")
}

impl TokenStore for FileTokenStore {
    fn save(&self, pair: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(Error::from)
                .context(format!("Creating {}", parent.display()))?;
        }

        let document = BTreeMap::from([
            (ACCESS_TOKEN_KEY, pair.access_token.as_str()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.as_str()),
        ]);
        let content = serde_json::to_string_pretty(&document)?;

        fs::write(&self.path, content)
            .map_err(Error::from)
            .context(format!("Writing {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn load(&self) -> Result<Option<TokenPair>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::from(e).with_context(format!("Reading {}", self.path.display())));
            }
        };

        let mut document: BTreeMap<String, String> = serde_json::from_str(&content)?;
        let pair = match (
            document.remove(ACCESS_TOKEN_KEY),
            document.remove(REFRESH_TOKEN_KEY),
        ) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => {
                return Err(Error::new(
                    ErrorCode::StorageCorrupted,
                    format!("{} is missing a token key", self.path.display()),
                ));
            }
        };

        Ok(pair)
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::from(e).with_context(format!("Removing {}", self.path.display()))),
        }
    }
}
