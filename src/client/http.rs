//! HTTP/JSON adapter for the versioned secret-store API
//!
//! Talks to a Vault-style server:
//!
//! - `GET  /v1/<path>`     read a secret; the body carries `{"data": {...}}`
//! - `LIST /v1/<path>`     list children; the body carries `{"data": {"keys": [...]}}`
//! - `GET  /v1/sys/mounts` enumerate mount points, filtered by engine type
//! - `POST /v1/<path>`     write, `DELETE /v1/<path>` delete
//!
//! A 404 on read or list is NotFound and maps to `Ok(None)`; every other
//! non-success status becomes `StoreError::Api` carrying the remote's error
//! message verbatim. Secret field order follows the JSON object order of the
//! response (serde_json is built with `preserve_order`).

use crate::client::{MountKind, Secret, SecretStore};
use crate::error::{StoreError, StoreResult};
use crate::path::canonicalize;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const TOKEN_HEADER: &str = "X-Vault-Token";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`HttpStore`]
pub struct HttpStoreBuilder {
    address: String,
    token: Option<String>,
    timeout: Duration,
    insecure_tls: bool,
}

impl HttpStoreBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            insecure_tls: false,
        }
    }

    /// Authentication token sent with every request
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Per-request timeout; this is also the only deadline the tree build
    /// observes, since the core has no cancellation of its own
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS certificate verification
    pub fn insecure_tls(mut self, insecure: bool) -> Self {
        self.insecure_tls = insecure;
        self
    }

    pub fn build(self) -> StoreResult<HttpStore> {
        let mut base = Url::parse(&self.address).map_err(|e| StoreError::InvalidAddress {
            address: self.address.clone(),
            reason: e.to_string(),
        })?;
        // Url::join treats the last segment as a file unless the path ends
        // with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        if !matches!(base.scheme(), "http" | "https") {
            return Err(StoreError::InvalidAddress {
                address: self.address.clone(),
                reason: format!("unsupported scheme '{}'", base.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.insecure_tls)
            .build()
            .map_err(|e| StoreError::Transport {
                path: String::new(),
                reason: e.to_string(),
            })?;

        Ok(HttpStore {
            client,
            base,
            token: self.token,
        })
    }
}

/// Blocking HTTP client for one remote store instance
///
/// One instance is shared by all workers; reqwest's blocking client pools
/// connections internally, so the three-way parallelism of the tree builder
/// multiplexes over a handful of sockets.
pub struct HttpStore {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpStore {
    /// Build the request URL for an API path
    fn url(&self, path: &str) -> StoreResult<Url> {
        let api = format!("v1/{}", canonicalize(path));
        self.base
            .join(&api)
            .map_err(|e| StoreError::InvalidAddress {
                address: self.base.to_string(),
                reason: e.to_string(),
            })
    }

    fn request(&self, method: Method, path: &str) -> StoreResult<RequestBuilder> {
        let url = self.url(path)?;
        trace!(method = %method, url = %url, "store request");
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        Ok(req)
    }

    fn send(&self, req: RequestBuilder, path: &str) -> StoreResult<Response> {
        req.send().map_err(|e| StoreError::Transport {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse the JSON body of a 2xx response
    fn json_body(&self, resp: Response, path: &str) -> StoreResult<Value> {
        resp.json().map_err(|e| StoreError::MalformedResponse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Turn a non-success, non-404 response into an API error
    fn api_error(&self, resp: Response, path: &str) -> StoreError {
        let status = resp.status().as_u16();
        let message = resp
            .json::<Value>()
            .ok()
            .and_then(|body| extract_error_message(&body))
            .unwrap_or_else(|| "no error detail".to_string());
        StoreError::Api {
            path: path.to_string(),
            status,
            message,
        }
    }
}

impl SecretStore for HttpStore {
    fn read(&self, path: &str) -> StoreResult<Option<Secret>> {
        let resp = self.send(self.request(Method::GET, path)?, path)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = self.json_body(resp, path)?;
                let data =
                    body.get("data")
                        .and_then(Value::as_object)
                        .ok_or_else(|| StoreError::MalformedResponse {
                            path: path.to_string(),
                            reason: "missing 'data' object".to_string(),
                        })?;
                let secret = data
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_string(v)))
                    .collect();
                Ok(Some(secret))
            }
            _ => Err(self.api_error(resp, path)),
        }
    }

    fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        // LIST is the verb the remote expects; some proxies strip it, in
        // which case `GET ?list=true` would be the fallback, but none of the
        // deployments this targets need that.
        let method = Method::from_bytes(b"LIST").expect("static method name");
        let resp = self.send(self.request(method, path)?, path)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = self.json_body(resp, path)?;
                let keys = body
                    .get("data")
                    .and_then(|d| d.get("keys"))
                    .and_then(Value::as_array)
                    .ok_or_else(|| StoreError::MalformedResponse {
                        path: path.to_string(),
                        reason: "missing 'data.keys' array".to_string(),
                    })?;
                let children = keys
                    .iter()
                    .map(|k| match k {
                        Value::String(s) => Ok(s.clone()),
                        other => Err(StoreError::MalformedResponse {
                            path: path.to_string(),
                            reason: format!("non-string key: {other}"),
                        }),
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(Some(children))
            }
            _ => Err(self.api_error(resp, path)),
        }
    }

    fn mounts(&self, kind: MountKind) -> StoreResult<Vec<String>> {
        let path = "sys/mounts";
        let resp = self.send(self.request(Method::GET, path)?, path)?;
        if !resp.status().is_success() {
            return Err(self.api_error(resp, path));
        }
        let body = self.json_body(resp, path)?;
        // Newer servers wrap the mount table in "data"; older ones return it
        // at the top level.
        let table = body
            .get("data")
            .and_then(Value::as_object)
            .or_else(|| body.as_object())
            .ok_or_else(|| StoreError::MalformedResponse {
                path: path.to_string(),
                reason: "mount table is not an object".to_string(),
            })?;

        let mut names = Vec::new();
        for (name, info) in table {
            let engine = info.get("type").and_then(Value::as_str).unwrap_or("");
            if engine == kind.as_str() {
                names.push(name.clone());
            }
        }
        debug!(kind = kind.as_str(), count = names.len(), "mounts listed");
        Ok(names)
    }

    fn write(&self, path: &str, secret: &Secret) -> StoreResult<()> {
        let body: serde_json::Map<String, Value> = secret
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        let resp = self.send(self.request(Method::POST, path)?.json(&body), path)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(self.api_error(resp, path))
        }
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        let resp = self.send(self.request(Method::DELETE, path)?, path)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(self.api_error(resp, path)),
        }
    }
}

/// Render a JSON value the way the contract demands: strings verbatim,
/// everything else as JSON text
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pull the error message out of a `{"errors": [...]}` body
fn extract_error_message(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    let joined = errors
        .iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_bad_address() {
        assert!(HttpStoreBuilder::new("not a url").build().is_err());
        assert!(HttpStoreBuilder::new("ftp://host").build().is_err());
        assert!(HttpStoreBuilder::new("https://vault.local:8200")
            .build()
            .is_ok());
    }

    #[test]
    fn test_url_canonicalizes_path() {
        let store = HttpStoreBuilder::new("http://vault.local:8200")
            .build()
            .unwrap();
        let url = store.url("/secret//foo/").unwrap();
        assert_eq!(url.as_str(), "http://vault.local:8200/v1/secret/foo");
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&Value::String("plain".into())), "plain");
        assert_eq!(value_to_string(&serde_json::json!(42)), "42");
        assert_eq!(
            value_to_string(&serde_json::json!({"nested": true})),
            r#"{"nested":true}"#
        );
    }

    #[test]
    fn test_extract_error_message() {
        let body = serde_json::json!({"errors": ["permission denied", "try again"]});
        assert_eq!(
            extract_error_message(&body),
            Some("permission denied; try again".to_string())
        );
        assert_eq!(extract_error_message(&serde_json::json!({})), None);
        assert_eq!(
            extract_error_message(&serde_json::json!({"errors": []})),
            None
        );
    }
}
