//! Error types for pod discovery and test invocation
//!
//! Every failure surfaced to the caller is one of four kinds. None of them is
//! retried by the component that raises it; the caller decides.

use thiserror::Error;

/// Boxed cause carried by cluster and invocation errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while locating pods and invoking tests
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or auth failure talking to the cluster API
    #[error("Cluster query failed: {message}")]
    ClusterQuery {
        message: String,
        #[source]
        source: BoxError,
    },

    /// No ready pod satisfies the label + index selection
    #[error("No ready pod at index {index} for labels [{selector}] ({ready} ready)")]
    PodNotFound {
        selector: String,
        index: usize,
        ready: usize,
    },

    /// The HTTP call to the pod failed or returned a non-success status
    #[error("Invocation of {url} failed: {reason}")]
    Invocation {
        url: String,
        reason: String,
        status: Option<u16>,
        #[source]
        source: Option<BoxError>,
    },
}

impl ProxyError {
    pub fn cluster_query(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        ProxyError::ClusterQuery {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Non-success HTTP status answered by the pod
    pub fn status(url: impl Into<String>, status: u16, body: &str) -> Self {
        let reason = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", truncate(body.trim(), 256))
        };
        ProxyError::Invocation {
            url: url.into(),
            reason,
            status: Some(status),
            source: None,
        }
    }

    /// Transport or decoding failure with the original cause attached
    pub fn invocation(
        url: impl Into<String>,
        reason: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        ProxyError::Invocation {
            url: url.into(),
            reason: reason.into(),
            status: None,
            source: Some(source.into()),
        }
    }

    /// HTTP status of an invocation failure, if the pod answered at all
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProxyError::Invocation { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProxyError::PodNotFound { .. })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_status_error_carries_code() {
        let err = ProxyError::status("http://10.0.0.1:8080/x", 503, "unavailable");
        assert_eq!(err.http_status(), Some(503));
        assert!(err.to_string().contains("HTTP 503: unavailable"));
        assert!(err.source().is_none());
    }

    #[test]
    fn test_invocation_keeps_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ProxyError::invocation("http://pod", "connect failed", cause);
        assert_eq!(err.http_status(), None);
        assert_eq!(err.source().map(|s| s.to_string()), Some("refused".to_string()));
    }

    #[test]
    fn test_pod_not_found_message() {
        let err = ProxyError::PodNotFound {
            selector: "app=web".to_string(),
            index: 2,
            ready: 1,
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "No ready pod at index 2 for labels [app=web] (1 ready)"
        );
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(1000);
        let err = ProxyError::status("u", 500, &body);
        assert!(err.to_string().len() < 400);
    }
}
