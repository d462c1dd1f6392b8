//! Kubernetes API client module
//!
//! Provides pod discovery for test invocation.

mod client;
mod pod;

pub use client::K8sClient;
pub use pod::PodLocator;

#[cfg(test)]
pub(crate) use pod::tests::{pod, FakePods};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

use crate::error::ProxyError;
use crate::models::LabelSet;

/// Source of pod listings
#[async_trait]
pub trait PodSource: Send + Sync {
    /// Pods in `namespace` matching the label selector, in API order
    async fn list_pods(&self, namespace: &str, labels: &LabelSet) -> Result<Vec<Pod>, ProxyError>;
}
