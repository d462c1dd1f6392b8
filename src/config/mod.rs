//! Configuration module
//!
//! Resolves the run configuration once at start-up (defaults, then config
//! file, then environment) and validates it before any cluster call.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::ProxyError;

/// How requests reach a pod
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    /// Straight to the pod IP
    #[default]
    Direct,
    /// Through the API server's pod proxy subresource
    Master,
}

impl RouteMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" | "pod" => Some(RouteMode::Direct),
            "master" | "apiserver" | "api-server" => Some(RouteMode::Master),
            _ => None,
        }
    }
}

impl fmt::Display for RouteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMode::Direct => write!(f, "direct"),
            RouteMode::Master => write!(f, "master"),
        }
    }
}

/// Run configuration, immutable once validated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Cluster API endpoint (KUBERNETES_MASTER)
    pub kubernetes_master: Option<String>,

    /// Docker registry endpoint (DOCKER_URL)
    pub docker_url: Option<String>,

    /// Core API version used in proxy URLs
    pub api_version: String,

    /// Namespace the test deployment lives in
    pub namespace: String,

    /// Image pushed for the test deployment
    pub image_name: String,

    /// Cluster / registry credentials
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub email: String,
    pub address: String,

    /// Seconds to wait for a test pod to become ready
    pub startup_timeout_secs: u64,

    /// Timeout for HTTP calls to the cluster and pods
    pub http_client_timeout_secs: u64,

    /// Interval of the event endpoint poll
    pub event_poll_interval_ms: u64,

    /// How long a "no result yet" (404) answer is retried
    pub result_wait_ms: u64,

    /// Port the test servlet listens on inside the pod
    pub pod_port: u16,

    /// How requests reach the pod
    pub route: RouteMode,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            kubernetes_master: None,
            docker_url: None,
            api_version: "v1".to_string(),
            namespace: "default".to_string(),
            image_name: "cetestimage".to_string(),
            username: String::new(),
            password: String::new(),
            email: String::new(),
            address: String::new(),
            startup_timeout_secs: 60,
            http_client_timeout_secs: 120,
            event_poll_interval_ms: 1000,
            result_wait_ms: 1000,
            pod_port: 8080,
            route: RouteMode::Direct,
        }
    }
}

impl Configuration {
    /// Resolve the full configuration: defaults, config file, environment.
    ///
    /// An explicit `path` must exist; otherwise the standard locations are
    /// searched and a missing file is not an error.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ProxyError> {
        Self::resolve_with(path, &EnvConfig::load())
    }

    pub(crate) fn resolve_with(path: Option<&Path>, env: &EnvConfig) -> Result<Self, ProxyError> {
        let file = match path.or(env.config_file.as_deref().map(Path::new)) {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::load_default()?,
        };

        let mut config = file.pod_invoker;
        env.apply(&mut config);
        Ok(config)
    }

    /// Fail fast on anything that would make the first cluster call pointless
    pub fn validate(&self) -> Result<(), ProxyError> {
        if is_blank(&self.kubernetes_master) {
            return Err(ProxyError::Configuration(
                "Null Kubernetes master! Set KUBERNETES_MASTER".to_string(),
            ));
        }
        if is_blank(&self.docker_url) {
            return Err(ProxyError::Configuration(
                "Null Docker url! Set DOCKER_URL".to_string(),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(ProxyError::Configuration("Empty namespace".to_string()));
        }
        if self.api_version.trim().is_empty() {
            return Err(ProxyError::Configuration("Empty API version".to_string()));
        }
        if self.pod_port == 0 {
            return Err(ProxyError::Configuration("Pod port must be non-zero".to_string()));
        }
        if self.http_client_timeout_secs == 0 || self.event_poll_interval_ms == 0 {
            return Err(ProxyError::Configuration(
                "HTTP timeout and event poll interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Master URL without a trailing slash; empty when unset
    pub fn master(&self) -> &str {
        self.kubernetes_master
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/')
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_client_timeout_secs)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn result_wait(&self) -> Duration {
        Duration::from_millis(self.result_wait_ms)
    }

    /// Print configuration with secrets masked
    pub fn print_summary(&self) {
        println!("Configuration:");
        println!("  kubernetes_master:        {}", display_opt(&self.kubernetes_master));
        println!("  docker_url:               {}", display_opt(&self.docker_url));
        println!("  api_version:              {}", self.api_version);
        println!("  namespace:                {}", self.namespace);
        println!("  image_name:               {}", self.image_name);
        println!("  username:                 {}", self.username);
        println!(
            "  password:                 {}",
            if self.password.is_empty() { "" } else { "******" }
        );
        println!("  email:                    {}", self.email);
        println!("  address:                  {}", self.address);
        println!("  startup_timeout_secs:     {}", self.startup_timeout_secs);
        println!("  http_client_timeout_secs: {}", self.http_client_timeout_secs);
        println!("  event_poll_interval_ms:   {}", self.event_poll_interval_ms);
        println!("  result_wait_ms:           {}", self.result_wait_ms);
        println!("  pod_port:                 {}", self.pod_port);
        println!("  route:                    {}", self.route);
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(true, str::is_empty)
}

fn display_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<unset>")
}
