//! HTTP client boundary
//!
//! `method` steps hand a fully built [`HttpRequest`] to an [`HttpClient`].
//! The default [`ReqwestClient`] keeps one connection pool per TLS mode.

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::common::{Error, Result};

/// Credential attached by `auth basic`
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    Basic { username: String, password: String },
}

/// A request assembled from the execution context
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
    pub credential: Option<Credential>,
    pub verify_tls: bool,
    pub timeout: Duration,
}

/// A received response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
    /// Decoded body, when it is valid JSON
    pub json: Option<Value>,
}

impl HttpResponse {
    /// Build a response, decoding the body as JSON when possible
    pub fn new(status: u16, headers: IndexMap<String, String>, body: Vec<u8>) -> Self {
        let json = serde_json::from_slice(&body).ok();
        Self {
            status,
            headers,
            body,
            json,
        }
    }

    /// Body as (lossy) UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send one request; transport failures are `Error::ApiConnection`
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed client
pub struct ReqwestClient {
    verified: reqwest::Client,
    unverified: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let verified = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        let unverified = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            verified,
            unverified,
        })
    }
}

fn header_map(headers: &IndexMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::step(&format!("header {} = {}", name, value), "invalid header name"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::step(&format!("header {} = {}", name, value), "invalid header value"))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let client = if request.verify_tls {
            &self.verified
        } else {
            &self.unverified
        };

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::step(&request.method, "invalid HTTP method"))?;

        let mut builder = client
            .request(method, &request.url)
            .headers(header_map(&request.headers)?)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(Credential::Basic { username, password }) = &request.credential {
            builder = builder.basic_auth(username, Some(password));
        }

        tracing::debug!("{} {}", request.method, request.url);
        let response = builder
            .send()
            .await
            .map_err(|e| Error::ApiConnection(format!("{} {}: {}", request.method, request.url, e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::ApiConnection(format!("Failed to read response body: {}", e)))?;

        tracing::debug!("{} {} -> {}", request.method, request.url, status);
        Ok(HttpResponse::new(status, headers, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decodes_json() {
        let resp = HttpResponse::new(200, IndexMap::new(), br#"{"id": 7}"#.to_vec());
        assert_eq!(resp.json, Some(serde_json::json!({"id": 7})));

        let resp = HttpResponse::new(500, IndexMap::new(), b"oops".to_vec());
        assert!(resp.json.is_none());
        assert_eq!(resp.text(), "oops");
    }

    #[test]
    fn test_header_map_rejects_bad_names() {
        let mut headers = IndexMap::new();
        headers.insert("X-Ok".to_string(), "1".to_string());
        assert!(header_map(&headers).is_ok());

        headers.insert("bad name".to_string(), "1".to_string());
        assert!(header_map(&headers).is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let client = ReqwestClient::new().unwrap();
        let request = HttpRequest {
            method: "GET".to_string(),
            url: "http://127.0.0.1:1/".to_string(),
            headers: IndexMap::new(),
            body: None,
            credential: None,
            verify_tls: true,
            timeout: Duration::from_secs(2),
        };
        let err = client.send(&request).await.unwrap_err();
        assert_eq!(err.kind(), "CONNECTION");
    }
}
