//! Configuration file loading and environment overrides

use super::schema::ConfigSchema;
use crate::error::{Error, Result, ResultExt};
use std::path::Path;
use std::str::FromStr;

/// Configuration file names searched, in order, when no path is given
const CANDIDATES: [&str; 3] = ["leadflow.toml", ".leadflow.toml", ".config/leadflow.toml"];

/// Configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from a file path or the standard locations, then
    /// apply `LEADFLOW_*` environment overrides.
    ///
    /// An explicit path that does not exist is an error; a missing file in the
    /// standard locations falls back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !Path::new(p).exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_string()),
            None => find_config_file(),
        };

        let mut schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        apply_overrides(&mut schema, |key| std::env::var(key).ok())?;

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Parse configuration from TOML text (no environment overrides)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let schema = toml::from_str(content)?;
        Ok(Self { schema, path: None })
    }

    /// Load with defaults only (no file)
    pub fn defaults() -> Self {
        Self {
            schema: ConfigSchema::default(),
            path: None,
        }
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<String> {
    CANDIDATES
        .iter()
        .find(|candidate| Path::new(candidate).exists())
        .map(|candidate| (*candidate).to_string())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &str) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Failed to read config file {path}"))?;

    toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("Failed to parse config file {path}"))
}

/// Apply `LEADFLOW_*` overrides using `lookup` to read variables.
pub fn apply_overrides<F>(schema: &mut ConfigSchema, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let api = &mut schema.api;

    if let Some(url) = lookup("LEADFLOW_API_URL") {
        api.base_url = url;
    }
    override_parsed(&lookup, "LEADFLOW_TIMEOUT_MS", &mut api.timeout_ms)?;
    override_parsed(&lookup, "LEADFLOW_MAX_RETRIES", &mut api.max_retries)?;
    override_parsed(&lookup, "LEADFLOW_RETRY_DELAY_MS", &mut api.retry_delay_ms)?;
    override_parsed(&lookup, "LEADFLOW_CACHE_TTL_MS", &mut api.cache_ttl_ms)?;
    override_parsed(&lookup, "LEADFLOW_CACHE_MAX_SIZE", &mut api.cache_max_size)?;
    override_parsed(&lookup, "LEADFLOW_OFFLINE_QUEUE_MAX", &mut api.offline_queue_max)?;

    if let Some(level) = lookup("LEADFLOW_LOG_LEVEL") {
        schema.telemetry.log_level = level;
    }
    override_parsed(&lookup, "LEADFLOW_LOG_JSON", &mut schema.telemetry.json)?;

    Ok(())
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| Error::invalid_value(key, &raw))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert!(config.path.is_none());
        assert_eq!(config.schema.api.timeout_ms, 10_000);
        assert_eq!(config.schema.api.max_retries, 3);
        assert_eq!(config.schema.api.retry_delay_ms, 1000);
        assert_eq!(config.schema.api.cache_ttl_ms, 60_000);
        assert_eq!(config.schema.api.cache_max_size, 100);
        assert_eq!(config.schema.api.offline_queue_max, 50);
        assert_eq!(
            config.schema.api.retry_status_codes,
            vec![408, 429, 500, 502, 503, 504]
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [api]
            base_url = "https://crm.example.com/api"
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.schema.api.base_url, "https://crm.example.com/api");
        assert_eq!(config.schema.api.max_retries, 5);
        assert_eq!(config.schema.api.timeout_ms, 10_000);
        assert_eq!(config.schema.telemetry.log_level, "info");
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[api\nbase_url = 1").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParse);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadflow.toml");
        std::fs::write(&path, "[api]\ncache_max_size = 7\n").unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.schema.api.cache_max_size, 7);
        assert!(config.path.is_some());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some("/definitely/not/here/leadflow.toml")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LEADFLOW_API_URL", "https://staging.example.com"),
            ("LEADFLOW_TIMEOUT_MS", "2500"),
            ("LEADFLOW_OFFLINE_QUEUE_MAX", "3"),
        ]);

        let mut schema = ConfigSchema::default();
        apply_overrides(&mut schema, |k| vars.get(k).map(ToString::to_string)).unwrap();

        assert_eq!(schema.api.base_url, "https://staging.example.com");
        assert_eq!(schema.api.timeout_ms, 2500);
        assert_eq!(schema.api.offline_queue_max, 3);
        assert_eq!(schema.api.max_retries, 3);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut schema = ConfigSchema::default();
        let err = apply_overrides(&mut schema, |k| {
            (k == "LEADFLOW_MAX_RETRIES").then(|| "lots".to_string())
        })
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::ConfigValue);
    }
}
