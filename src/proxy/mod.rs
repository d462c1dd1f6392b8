//! Request proxy
//!
//! Resolves pod addresses, builds pod URLs and issues the HTTP calls made
//! on behalf of a test. Requests routed through the master go over the
//! cluster client so they carry its credentials. Direct requests use an
//! HTTP client that trusts the cluster's roots and is built once, on
//! first use.

mod route;

pub use route::pod_url;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::{Configuration, RouteMode};
use crate::error::ProxyError;
use crate::http::{HttpClient, HttpRequest, HttpResponse, TlsMaterial};
use crate::k8s::{K8sClient, PodLocator};
use crate::models::{CommandEvent, LabelSet, TestResult};

/// What the test invoker needs from a proxy
#[async_trait]
pub trait PodProxy: Send + Sync {
    /// Address of the `index`-th ready pod matching `labels`
    async fn find_pod(&self, labels: &LabelSet, index: usize) -> Result<String, ProxyError>;

    /// URL of `path?query` on the pod
    fn url(&self, host: &str, port: u16, path: &str, query: &str) -> String;

    /// Run the test behind `url` and decode its result
    async fn invoke_test(&self, url: &str) -> Result<TestResult, ProxyError>;

    /// Fetch pending events from the event endpoint
    async fn poll_events(&self, url: &str) -> Result<Vec<CommandEvent>, ProxyError>;
}

/// Proxy for requests to test pods
pub struct RequestProxy {
    config: Arc<Configuration>,
    locator: PodLocator,
    tls: TlsMaterial,
    cluster: Option<kube::Client>,
    http_client: OnceCell<HttpClient>,
}

impl RequestProxy {
    pub fn new(config: Arc<Configuration>, locator: PodLocator, tls: TlsMaterial) -> Self {
        Self {
            config,
            locator,
            tls,
            cluster: None,
            http_client: OnceCell::new(),
        }
    }

    /// Send master-routed requests through `client`
    pub fn with_cluster(mut self, client: kube::Client) -> Self {
        self.cluster = Some(client);
        self
    }

    /// Validate the configuration and connect to the cluster
    pub async fn connect(config: Arc<Configuration>) -> Result<Self, ProxyError> {
        let k8s = K8sClient::from_configuration(&config).await?;
        let tls = k8s.tls().clone();
        let cluster = k8s.client().clone();
        let locator = PodLocator::new(Arc::new(k8s), &config);
        Ok(Self::new(config, locator, tls).with_cluster(cluster))
    }

    pub fn locator(&self) -> &PodLocator {
        &self.locator
    }

    pub fn url(&self, host: &str, port: u16, path: &str, query: &str) -> String {
        pod_url(&self.config, host, port, path, query)
    }

    pub async fn find_pod(&self, labels: &LabelSet, index: usize) -> Result<String, ProxyError> {
        self.locator.find_pod(labels, index).await
    }

    /// HTTP client derived from the cluster's TLS settings, built once
    pub async fn http_client(&self) -> Result<&HttpClient, ProxyError> {
        self.http_client
            .get_or_try_init(|| async {
                HttpClient::from_cluster(
                    &self.tls,
                    self.config.http_client_timeout_secs,
                    self.config.credentials(),
                )
                .map_err(|e| ProxyError::Configuration(e.to_string()))
            })
            .await
    }

    /// Send `request`, failing on transport errors and non-2xx answers
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ProxyError> {
        match self.cluster_path(&request.url) {
            Some(path) => self.execute_in_cluster(path, request).await,
            None => self.execute_direct(request).await,
        }
    }

    /// API-server path of `url` when it is routed through the master
    fn cluster_path(&self, url: &str) -> Option<String> {
        if self.config.route != RouteMode::Master {
            return None;
        }
        url.strip_prefix(self.config.master())
            .filter(|path| path.starts_with('/'))
            .map(str::to_string)
    }

    async fn execute_in_cluster(
        &self,
        path: String,
        request: HttpRequest,
    ) -> Result<HttpResponse, ProxyError> {
        let url = request.url;
        let cluster = self.cluster.as_ref().ok_or_else(|| {
            ProxyError::Configuration(format!(
                "No cluster client to route {url} through the master"
            ))
        })?;

        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(path.as_str());
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        let cluster_request = builder
            .body(request.body.unwrap_or_default().into_bytes())
            .map_err(|e| ProxyError::invocation(&url, "Failed to build cluster request", e))?;

        debug!("Sending {} request to {} via the cluster client", request.method, path);
        let start = Instant::now();

        match cluster.request_text(cluster_request).await {
            Ok(body) => Ok(HttpResponse {
                // request_text only yields the body of a successful answer
                status_code: 200,
                headers: HashMap::new(),
                body,
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(kube::Error::Api(answer)) => Err(ProxyError::status(
                url,
                answer.code,
                answer.message.trim_matches('"'),
            )),
            Err(e) => Err(ProxyError::invocation(&url, e.to_string(), e)),
        }
    }

    async fn execute_direct(&self, request: HttpRequest) -> Result<HttpResponse, ProxyError> {
        let url = request.url.clone();
        let client = self.http_client().await?;
        let response = client
            .send(request)
            .await
            .map_err(|e| ProxyError::invocation(&url, e.to_string(), e))?;

        if !response.is_success() {
            return Err(ProxyError::status(url, response.status_code, &response.body));
        }
        Ok(response)
    }

    /// POST to `url` and decode the JSON answer
    pub async fn post<T, B>(&self, url: &str, body: Option<&B>) -> Result<T, ProxyError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = match body {
            Some(body) => HttpRequest::post(url)
                .json(body)
                .map_err(|e| ProxyError::invocation(url, "Failed to encode request body", e))?,
            None => HttpRequest::post(url),
        };
        let response = self.execute(request).await?;
        decode(url, &response)
    }

    /// GET `url` and decode the JSON answer
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProxyError> {
        let response = self.execute(HttpRequest::get(url)).await?;
        decode(url, &response)
    }

    /// POST to `path` on the `index`-th ready pod and return the raw body
    pub async fn exec(
        &self,
        labels: &LabelSet,
        index: usize,
        path: &str,
    ) -> Result<String, ProxyError> {
        let pod = self.find_pod(labels, index).await?;
        let url = self.url(&pod, self.config.pod_port, path, "");
        debug!("Invoking url: {}", url);

        let response = self.execute(HttpRequest::post(&url)).await?;
        Ok(response.body)
    }
}

#[async_trait]
impl PodProxy for RequestProxy {
    async fn find_pod(&self, labels: &LabelSet, index: usize) -> Result<String, ProxyError> {
        RequestProxy::find_pod(self, labels, index).await
    }

    fn url(&self, host: &str, port: u16, path: &str, query: &str) -> String {
        RequestProxy::url(self, host, port, path, query)
    }

    async fn invoke_test(&self, url: &str) -> Result<TestResult, ProxyError> {
        self.post::<TestResult, ()>(url, None).await
    }

    async fn poll_events(&self, url: &str) -> Result<Vec<CommandEvent>, ProxyError> {
        let response = match self.execute(HttpRequest::get(url)).await {
            Ok(response) => response,
            // nothing queued yet
            Err(e) if e.http_status() == Some(404) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        CommandEvent::parse_body(&response.body)
            .map_err(|e| ProxyError::invocation(url, "Malformed event payload", e))
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: &HttpResponse) -> Result<T, ProxyError> {
    serde_json::from_str(&response.body)
        .map_err(|e| ProxyError::invocation(url, format!("Failed to decode response: {e}"), e))
}
