//! HTTP client for pod invocation
//!
//! Wraps reqwest with the cluster's trust roots and the configured
//! credentials.

use reqwest::{Certificate, Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(#[source] reqwest::Error),

    #[error("Timeout after {secs} seconds")]
    Timeout {
        secs: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("Connection refused to {url}")]
    ConnectionRefused {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Trust settings taken from the cluster client configuration.
///
/// Only direct pod traffic uses these; master-routed requests go through
/// the cluster client itself.
#[derive(Clone, Debug, Default)]
pub struct TlsMaterial {
    /// DER-encoded root certificates
    pub root_certs: Vec<Vec<u8>>,
    pub accept_invalid_certs: bool,
    pub connect_timeout: Option<Duration>,
}

impl From<&kube::Config> for TlsMaterial {
    fn from(config: &kube::Config) -> Self {
        Self {
            root_certs: config.root_cert.clone().unwrap_or_default(),
            accept_invalid_certs: config.accept_invalid_certs,
            connect_timeout: config.connect_timeout,
        }
    }
}

/// HTTP client for pod requests
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    credentials: Option<(String, String)>,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create a client trusting the cluster's roots
    pub fn from_cluster(
        tls: &TlsMaterial,
        timeout_secs: u64,
        credentials: Option<(&str, &str)>,
    ) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .cookie_store(true)
            .danger_accept_invalid_certs(tls.accept_invalid_certs);

        if let Some(connect) = tls.connect_timeout {
            builder = builder.connect_timeout(connect);
        }

        for der in &tls.root_certs {
            let cert = Certificate::from_der(der)
                .map_err(|e| HttpError::TlsError(format!("Invalid root certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| HttpError::TlsError(format!("Failed to create HTTP client: {e}")))?;

        debug!(
            roots = tls.root_certs.len(),
            insecure = tls.accept_invalid_certs,
            timeout_secs,
            "Built HTTP client from cluster TLS settings"
        );

        Ok(Self {
            client,
            credentials: credentials.map(|(u, p)| (u.to_string(), p.to_string())),
            timeout_secs,
        })
    }

    /// Send HTTP request
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        debug!("Sending {} request to {}", request.method, request.url);

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| HttpError::InvalidMethod(request.method.clone()))?;

        let mut req_builder = self.client.request(method, &request.url);

        if let Some((user, password)) = &self.credentials {
            req_builder = req_builder.basic_auth(user, Some(password));
        }

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let start = std::time::Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout {
                    secs: self.timeout_secs,
                    source: e,
                }
            } else if e.is_connect() {
                HttpError::ConnectionRefused {
                    url: request.url.clone(),
                    source: e,
                }
            } else {
                HttpError::RequestFailed(e)
            }
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (key.to_string(), v.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(HttpError::Body)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            headers,
            body,
            duration_ms,
        })
    }
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body with matching content type
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(body)?;
        Ok(self.header("Content-Type", "application/json").body(body))
    }
}

/// HTTP response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
