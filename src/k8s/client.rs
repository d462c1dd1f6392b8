//! Kubernetes client wrapper
//!
//! Builds the kube client from the run configuration and keeps the TLS
//! material it was built with, so pod traffic can trust the same roots.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, ListParams},
    Client, Config,
};
use std::str::FromStr;
use tracing::{debug, info};

use super::PodSource;
use crate::config::Configuration;
use crate::error::ProxyError;
use crate::http::TlsMaterial;
use crate::models::LabelSet;

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
    tls: TlsMaterial,
}

impl K8sClient {
    /// Create a client for the configured master.
    ///
    /// Credentials and trust roots come from the inferred kubeconfig or
    /// in-cluster environment; the cluster URL is always the configured
    /// master.
    pub async fn from_configuration(config: &Configuration) -> Result<Self, ProxyError> {
        config.validate()?;
        let master = config.master();

        let mut kube_config = match Config::infer().await {
            Ok(inferred) => inferred,
            Err(e) => {
                debug!("No kubeconfig inferred ({}), using bare master URL", e);
                Config::new(parse_cluster_url(master)?)
            }
        };
        kube_config.cluster_url = parse_cluster_url(master)?;
        kube_config.default_namespace = config.namespace.clone();
        kube_config.connect_timeout = Some(config.http_timeout());
        kube_config.read_timeout = Some(config.http_timeout());

        Self::with_config(kube_config)
    }

    /// Create client with custom config
    pub fn with_config(config: Config) -> Result<Self, ProxyError> {
        let tls = TlsMaterial::from(&config);
        let cluster_url = config.cluster_url.to_string();
        let client = Client::try_from(config).map_err(|e| {
            ProxyError::cluster_query(format!("Failed to create client for {cluster_url}"), e)
        })?;

        info!("Connected Kubernetes client to {}", cluster_url);

        Ok(Self { client, tls })
    }

    /// TLS material the client was built with
    pub fn tls(&self) -> &TlsMaterial {
        &self.tls
    }

    /// The underlying kube client, carrying the cluster credentials
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl PodSource for K8sClient {
    async fn list_pods(&self, namespace: &str, labels: &LabelSet) -> Result<Vec<Pod>, ProxyError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = if labels.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(&labels.to_selector())
        };

        let list = pods.list(&params).await.map_err(|e| {
            ProxyError::cluster_query(
                format!("Failed to list pods in {namespace} with labels [{labels}]"),
                e,
            )
        })?;

        Ok(list.items)
    }
}

fn parse_cluster_url<U>(master: &str) -> Result<U, ProxyError>
where
    U: FromStr,
    U::Err: std::fmt::Display,
{
    master.parse::<U>().map_err(|e| {
        ProxyError::Configuration(format!("Invalid Kubernetes master URL '{master}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cluster_url_error() {
        let parsed: Result<u16, ProxyError> = parse_cluster_url("not-a-port");
        assert!(matches!(parsed, Err(ProxyError::Configuration(msg)) if msg.contains("not-a-port")));
    }

    #[tokio::test]
    async fn test_from_configuration_validates_first() {
        let config = Configuration::default();
        let result = K8sClient::from_configuration(&config).await;
        assert!(matches!(result, Err(ProxyError::Configuration(_))));
    }
}
