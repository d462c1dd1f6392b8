//! Pod selection for test execution
//!
//! Picks the n-th ready pod matching a label set.

use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::PodSource;
use crate::config::{Configuration, RouteMode};
use crate::error::ProxyError;
use crate::models::LabelSet;

/// Interval between pod listings while waiting for readiness
const WAIT_INTERVAL: Duration = Duration::from_secs(2);

/// A pod is ready when it is Running and its Ready condition is True.
///
/// Only the first `Ready` condition is consulted; comparisons ignore case.
pub fn is_ready(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };

    let running = status
        .phase
        .as_deref()
        .is_some_and(|phase| phase.eq_ignore_ascii_case("Running"));
    if !running {
        return false;
    }

    status
        .conditions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|c| c.type_.eq_ignore_ascii_case("Ready"))
        .is_some_and(|c| c.status.eq_ignore_ascii_case("True"))
}

pub fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or("<unnamed>")
}

/// Locates ready pods by label and ordinal index
#[derive(Clone)]
pub struct PodLocator {
    source: Arc<dyn PodSource>,
    namespace: String,
    route: RouteMode,
}

impl PodLocator {
    pub fn new(source: Arc<dyn PodSource>, config: &Configuration) -> Self {
        Self {
            source,
            namespace: config.namespace.clone(),
            route: config.route,
        }
    }

    /// Ready pods matching every label, in the order the API returned them
    pub async fn ready_pods(&self, labels: &LabelSet) -> Result<Vec<Pod>, ProxyError> {
        let pods = self.source.list_pods(&self.namespace, labels).await?;
        let total = pods.len();

        let ready: Vec<Pod> = pods
            .into_iter()
            .filter(|pod| labels.matches(pod.metadata.labels.as_ref()))
            .filter(is_ready)
            .collect();

        debug!(
            namespace = %self.namespace,
            selector = %labels,
            total,
            ready = ready.len(),
            "Listed pods"
        );

        Ok(ready)
    }

    /// Address of the `index`-th ready pod.
    ///
    /// The address is the pod IP for direct routing and the pod name when
    /// traffic goes through the API server.
    pub async fn find_pod(&self, labels: &LabelSet, index: usize) -> Result<String, ProxyError> {
        let ready = self.ready_pods(labels).await?;
        let not_found = || ProxyError::PodNotFound {
            selector: labels.to_selector(),
            index,
            ready: ready.len(),
        };

        let pod = ready.get(index).ok_or_else(not_found)?;
        let address = match self.route {
            RouteMode::Master => pod.metadata.name.clone(),
            RouteMode::Direct => pod.status.as_ref().and_then(|s| s.pod_ip.clone()),
        }
        .ok_or_else(not_found)?;

        info!(
            pod = pod_name(pod),
            index,
            address = %address,
            "Located pod"
        );

        Ok(address)
    }

    /// Poll until the `index`-th ready pod exists or `timeout` elapses.
    ///
    /// Cluster query failures end the wait immediately.
    pub async fn wait_for_pod(
        &self,
        labels: &LabelSet,
        index: usize,
        timeout: Duration,
    ) -> Result<String, ProxyError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.find_pod(labels, index).await {
                Ok(address) => return Ok(address),
                Err(e) if e.is_not_found() && Instant::now() + WAIT_INTERVAL < deadline => {
                    debug!("{}; retrying in {:?}", e, WAIT_INTERVAL);
                    sleep(WAIT_INTERVAL).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    pub(crate) fn pod(name: &str, phase: &str, ready: Option<&str>, labels: &[(&str, &str)]) -> Pod {
        let conditions = ready.map(|status| {
            vec![
                PodCondition {
                    type_: "PodScheduled".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                },
                PodCondition {
                    type_: "Ready".to_string(),
                    status: status.to_string(),
                    ..Default::default()
                },
            ]
        });
        let labels: BTreeMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                conditions,
                pod_ip: Some(format!("10.1.0.{}", name.len())),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Pod source returning a fixed list, or a failure
    pub(crate) struct FakePods {
        pods: Vec<Pod>,
        fail: bool,
        pub(crate) calls: Mutex<Vec<(String, String)>>,
    }

    impl FakePods {
        pub(crate) fn new(pods: Vec<Pod>) -> Self {
            Self {
                pods,
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl PodSource for FakePods {
        async fn list_pods(
            &self,
            namespace: &str,
            labels: &LabelSet,
        ) -> Result<Vec<Pod>, ProxyError> {
            self.calls
                .lock()
                .unwrap()
                .push((namespace.to_string(), labels.to_selector()));
            if self.fail {
                let cause = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "forbidden");
                return Err(ProxyError::cluster_query("Failed to list pods", cause));
            }
            Ok(self.pods.clone())
        }
    }

    fn locator(source: FakePods, route: RouteMode) -> PodLocator {
        let config = Configuration {
            namespace: "cearq".to_string(),
            route,
            ..Default::default()
        };
        PodLocator::new(Arc::new(source), &config)
    }

    const APP: &[(&str, &str)] = &[("deploymentConfig", "jws-app")];

    #[test]
    fn test_not_running_never_ready() {
        for phase in ["Pending", "Succeeded", "Failed", "Unknown"] {
            assert!(!is_ready(&pod("p", phase, Some("True"), APP)), "{phase}");
        }
    }

    #[test]
    fn test_running_without_ready_condition() {
        assert!(!is_ready(&pod("p", "Running", None, APP)));

        let mut no_status = pod("p", "Running", Some("True"), APP);
        no_status.status = None;
        assert!(!is_ready(&no_status));
    }

    #[test]
    fn test_running_and_ready_ignores_case() {
        assert!(is_ready(&pod("p", "Running", Some("True"), APP)));
        assert!(is_ready(&pod("p", "running", Some("true"), APP)));
        assert!(is_ready(&pod("p", "RUNNING", Some("TRUE"), APP)));
        assert!(!is_ready(&pod("p", "Running", Some("False"), APP)));
    }

    #[test]
    fn test_first_ready_condition_wins() {
        let mut p = pod("p", "Running", Some("False"), APP);
        if let Some(conditions) = p.status.as_mut().and_then(|s| s.conditions.as_mut()) {
            conditions.push(PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            });
        }
        assert!(!is_ready(&p));
    }

    #[tokio::test]
    async fn test_find_pod_by_index() {
        let pods = vec![
            pod("a", "Running", Some("True"), APP),
            pod("bb", "Pending", None, APP),
            pod("ccc", "Running", Some("True"), APP),
            pod("dddd", "Running", Some("False"), APP),
            pod("eeeee", "Running", Some("True"), APP),
        ];
        let locator = locator(FakePods::new(pods), RouteMode::Master);
        let labels = LabelSet::new().with("deploymentConfig", "jws-app");

        assert_eq!(locator.find_pod(&labels, 0).await.unwrap(), "a");
        assert_eq!(locator.find_pod(&labels, 1).await.unwrap(), "ccc");
        assert_eq!(locator.find_pod(&labels, 2).await.unwrap(), "eeeee");

        for index in [3, 4, 10] {
            match locator.find_pod(&labels, index).await {
                Err(ProxyError::PodNotFound { index: i, ready, .. }) => {
                    assert_eq!(i, index);
                    assert_eq!(ready, 3);
                }
                other => panic!("expected PodNotFound, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_find_pod_direct_returns_ip() {
        let locator = locator(
            FakePods::new(vec![pod("web-1", "Running", Some("True"), APP)]),
            RouteMode::Direct,
        );
        let labels = LabelSet::new().with("deploymentConfig", "jws-app");

        assert_eq!(locator.find_pod(&labels, 0).await.unwrap(), "10.1.0.5");
    }

    #[tokio::test]
    async fn test_find_pod_filters_label_mismatch() {
        let pods = vec![
            pod("other", "Running", Some("True"), &[("deploymentConfig", "other")]),
            pod("mine", "Running", Some("True"), APP),
        ];
        let source = FakePods::new(pods);
        let locator = locator(source, RouteMode::Master);
        let labels = LabelSet::new().with("deploymentConfig", "jws-app");

        assert_eq!(locator.find_pod(&labels, 0).await.unwrap(), "mine");
        assert!(locator.find_pod(&labels, 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_find_pod_queries_configured_namespace() {
        let source = Arc::new(FakePods::new(Vec::new()));
        let config = Configuration {
            namespace: "cearq".to_string(),
            ..Default::default()
        };
        let locator = PodLocator::new(source.clone(), &config);
        let labels = LabelSet::new().with("app", "web");

        let _ = locator.find_pod(&labels, 0).await;

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("cearq".to_string(), "app=web".to_string())]);
    }

    #[tokio::test]
    async fn test_cluster_failure_is_distinct() {
        let locator = locator(FakePods::failing(), RouteMode::Direct);
        let err = locator
            .find_pod(&LabelSet::new().with("app", "web"), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::ClusterQuery { .. }));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_wait_for_pod_gives_up() {
        let locator = locator(FakePods::new(Vec::new()), RouteMode::Direct);
        let err = locator
            .wait_for_pod(&LabelSet::new(), 0, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_wait_for_pod_fails_fast_on_cluster_error() {
        let locator = locator(FakePods::failing(), RouteMode::Direct);
        let err = locator
            .wait_for_pod(&LabelSet::new(), 0, Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::ClusterQuery { .. }));
    }
}
