//! get / post / put / patch / delete

use super::Context;
use crate::output;
use anyhow::{Context as _, Result};
use leadflow_api_client::{ApiError, HttpMethod, RequestConfig};
use serde_json::Value;
use std::fs;

/// Parse a `key=value` query argument
pub fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

/// Parse a `--body` argument: inline JSON, or `@path` to read a JSON file
pub fn parse_body(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Request body is not valid JSON")
}

/// A request as described on the command line
#[derive(Debug)]
pub struct Call {
    config: RequestConfig,
}

impl Call {
    fn new(method: HttpMethod, path: String, query: Vec<(String, String)>) -> Self {
        let config = query
            .into_iter()
            .fold(RequestConfig::new(method, path), |config, (key, value)| {
                config.with_query(key, value)
            });
        Self { config }
    }

    pub fn get(path: String, query: Vec<(String, String)>) -> Self {
        Self::new(HttpMethod::Get, path, query)
    }

    pub fn post(path: String, query: Vec<(String, String)>) -> Self {
        Self::new(HttpMethod::Post, path, query)
    }

    pub fn put(path: String, query: Vec<(String, String)>) -> Self {
        Self::new(HttpMethod::Put, path, query)
    }

    pub fn patch(path: String, query: Vec<(String, String)>) -> Self {
        Self::new(HttpMethod::Patch, path, query)
    }

    pub fn delete(path: String, query: Vec<(String, String)>) -> Self {
        Self::new(HttpMethod::Delete, path, query)
    }

    pub fn with_body(mut self, raw: Option<&str>) -> Result<Self> {
        if let Some(raw) = raw {
            self.config = self.config.with_body(parse_body(raw)?);
        }
        Ok(self)
    }

    pub fn no_cache(mut self, no_cache: bool) -> Self {
        if no_cache {
            self.config = self.config.skip_cache();
        }
        self
    }

    pub fn skip_auth(mut self, skip_auth: bool) -> Self {
        if skip_auth {
            self.config = self.config.skip_auth();
        }
        self
    }
}

/// Issue the request and print the response
pub async fn run(ctx: &Context, call: Call) -> Result<()> {
    let method = call.config.method;
    let path = call.config.path.clone();

    let result = ctx.client.request_value(call.config).await;

    if ctx.verbose {
        output::metrics();
    }

    match result {
        Ok(response) => {
            output::response(method, &path, &response, ctx.json);
            Ok(())
        }
        Err(ApiError::Offline { queued_id }) => {
            output::queued(queued_id, ctx.json);
            anyhow::bail!("device is offline")
        }
        Err(err) => {
            output::api_error(&err, ctx.json);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_query_pair() {
        assert_eq!(
            parse_query_pair("status=new").unwrap(),
            ("status".to_string(), "new".to_string())
        );
        assert_eq!(
            parse_query_pair("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_query_pair("empty=").unwrap().1, "");
        assert!(parse_query_pair("novalue").is_err());
        assert!(parse_query_pair("=x").is_err());
    }

    #[test]
    fn test_parse_inline_body() {
        assert_eq!(parse_body(r#"{"name":"Ada"}"#).unwrap(), json!({"name": "Ada"}));
        assert!(parse_body("{not json").is_err());
    }

    #[test]
    fn test_parse_body_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"stage": "won"}}"#).unwrap();

        let raw = format!("@{}", file.path().display());
        assert_eq!(parse_body(&raw).unwrap(), json!({"stage": "won"}));
        assert!(parse_body("@/nonexistent/body.json").is_err());
    }

    #[test]
    fn test_call_builds_request_config() {
        let call = Call::get(
            "leads".into(),
            vec![("status".into(), "new".into()), ("page".into(), "2".into())],
        )
        .no_cache(true)
        .skip_auth(true);

        assert_eq!(call.config.method, HttpMethod::Get);
        assert_eq!(call.config.query_pairs().len(), 2);
        assert!(call.config.skip_cache);
        assert!(call.config.skip_auth);
        assert!(!call.config.is_cacheable());
    }

    #[test]
    fn test_call_with_body() {
        let call = Call::post("leads".into(), vec![])
            .with_body(Some(r#"{"name":"Ada"}"#))
            .unwrap();
        assert_eq!(call.config.body, Some(json!({"name": "Ada"})));

        let call = Call::delete("leads/1".into(), vec![]).with_body(None).unwrap();
        assert_eq!(call.config.body, None);
    }
}
