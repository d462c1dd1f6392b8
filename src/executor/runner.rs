//! Test invocation
//!
//! Resolves which pod a test runs in, polls its events while the test
//! executes and waits for the result.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::EventScheduler;
use crate::config::Configuration;
use crate::error::ProxyError;
use crate::models::{
    Deployment, Dispatch, LabelSet, TestResult, TestTarget, RUN_IN_POD_CONTEXT, SERVLET_MAPPING,
};
use crate::proxy::PodProxy;
use crate::utils::Timer;

/// Pause between attempts while the pod has no result yet
const RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Runs test methods inside pods of a deployment
pub struct TestInvoker {
    proxy: Arc<dyn PodProxy>,
    scheduler: Arc<dyn EventScheduler>,
    deployment: Deployment,
    port: u16,
    result_wait: Duration,
}

/// Where a single invocation goes
#[derive(Debug, PartialEq, Eq)]
struct Resolved {
    labels: LabelSet,
    context: String,
    index: usize,
}

impl TestInvoker {
    pub fn new(
        proxy: Arc<dyn PodProxy>,
        scheduler: Arc<dyn EventScheduler>,
        deployment: Deployment,
        config: &Configuration,
    ) -> Self {
        Self {
            proxy,
            scheduler,
            deployment,
            port: config.pod_port,
            result_wait: config.result_wait(),
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Invoke `target` in its pod and return the runner's result.
    ///
    /// Event polling starts before the request and is cancelled on every
    /// exit path.
    pub async fn invoke(&self, target: &TestTarget) -> Result<TestResult, ProxyError> {
        let resolved = self.resolve(target.dispatch);
        let host = self.proxy.find_pod(&resolved.labels, resolved.index).await?;

        let path = format!("{}{}", resolved.context, SERVLET_MAPPING);
        let url = self.proxy.url(&host, self.port, &path, &target.query());
        let event_url = self.proxy.url(&host, self.port, &path, &target.event_query());

        info!(test = %target, pod = %host, "Invoking test");
        debug!("Invocation url: {}", url);

        let token = CancellationToken::new();
        self.scheduler.schedule(event_url, token.child_token());
        let _polling = token.drop_guard();

        let timer = Timer::start(target.to_string());
        let result = self.execute_with_retry(&url).await;
        let elapsed_ms = timer.stop().as_millis() as u64;

        match &result {
            Ok(r) => info!(test = %target, status = %r.status, elapsed_ms, "Test finished"),
            Err(e) => warn!(test = %target, elapsed_ms, "Invocation failed: {}", e),
        }

        result
    }

    fn resolve(&self, dispatch: Dispatch) -> Resolved {
        match dispatch {
            Dispatch::RunInPod => Resolved {
                labels: Deployment::run_in_pod().labels,
                context: RUN_IN_POD_CONTEXT.to_string(),
                index: 0,
            },
            Dispatch::Deployment | Dispatch::Indexed(_) => Resolved {
                labels: self.deployment.labels.clone(),
                context: self.deployment.context_root.clone(),
                index: dispatch.index(),
            },
        }
    }

    /// A 404 means the runner has no result yet; ask again until the wait
    /// window closes.
    async fn execute_with_retry(&self, url: &str) -> Result<TestResult, ProxyError> {
        let deadline = Instant::now() + self.result_wait;

        loop {
            match self.proxy.invoke_test(url).await {
                Err(e) if e.http_status() == Some(404) && Instant::now() + RETRY_INTERVAL <= deadline => {
                    debug!("No result yet from {}", url);
                    sleep(RETRY_INTERVAL).await;
                }
                other => return other,
            }
        }
    }
}
