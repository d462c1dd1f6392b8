//! Environment variable configuration
//!
//! The cluster master and registry URLs come from the well-known
//! `KUBERNETES_MASTER` / `DOCKER_URL` variables; everything else can be
//! overridden with `POD_INVOKER_*`.

use std::env;
use std::str::FromStr;

use super::{Configuration, RouteMode};

/// Environment variable prefix
const ENV_PREFIX: &str = "POD_INVOKER";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// KUBERNETES_MASTER
    pub kubernetes_master: Option<String>,
    /// DOCKER_URL
    pub docker_url: Option<String>,
    /// DOCKER_PASSWORD
    pub password: Option<String>,
    /// POD_INVOKER_USERNAME
    pub username: Option<String>,
    /// POD_INVOKER_EMAIL
    pub email: Option<String>,
    /// POD_INVOKER_ADDRESS
    pub address: Option<String>,
    /// POD_INVOKER_NAMESPACE
    pub namespace: Option<String>,
    /// POD_INVOKER_API_VERSION
    pub api_version: Option<String>,
    /// POD_INVOKER_IMAGE
    pub image_name: Option<String>,
    /// POD_INVOKER_STARTUP_TIMEOUT (seconds)
    pub startup_timeout: Option<u64>,
    /// POD_INVOKER_HTTP_TIMEOUT (seconds)
    pub http_timeout: Option<u64>,
    /// POD_INVOKER_POLL_INTERVAL (milliseconds)
    pub poll_interval: Option<u64>,
    /// POD_INVOKER_RESULT_WAIT (milliseconds)
    pub result_wait: Option<u64>,
    /// POD_INVOKER_PORT
    pub port: Option<u16>,
    /// POD_INVOKER_ROUTE (direct, master)
    pub route: Option<RouteMode>,
    /// POD_INVOKER_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefixed = |name: &str| lookup(&format!("{ENV_PREFIX}_{name}"));

        Self {
            kubernetes_master: lookup("KUBERNETES_MASTER"),
            docker_url: lookup("DOCKER_URL"),
            password: lookup("DOCKER_PASSWORD"),
            username: prefixed("USERNAME"),
            email: prefixed("EMAIL"),
            address: prefixed("ADDRESS"),
            namespace: prefixed("NAMESPACE"),
            api_version: prefixed("API_VERSION"),
            image_name: prefixed("IMAGE"),
            startup_timeout: parse_var(prefixed("STARTUP_TIMEOUT")),
            http_timeout: parse_var(prefixed("HTTP_TIMEOUT")),
            poll_interval: parse_var(prefixed("POLL_INTERVAL")),
            result_wait: parse_var(prefixed("RESULT_WAIT")),
            port: parse_var(prefixed("PORT")),
            route: prefixed("ROUTE").and_then(|v| RouteMode::from_str(&v)),
            config_file: prefixed("CONFIG"),
        }
    }

    /// Overlay the values that are set onto `config`
    pub fn apply(&self, config: &mut Configuration) {
        if let Some(master) = &self.kubernetes_master {
            config.kubernetes_master = Some(master.clone());
        }
        if let Some(url) = &self.docker_url {
            config.docker_url = Some(url.clone());
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(email) = &self.email {
            config.email = email.clone();
        }
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(version) = &self.api_version {
            config.api_version = version.clone();
        }
        if let Some(image) = &self.image_name {
            config.image_name = image.clone();
        }
        if let Some(secs) = self.startup_timeout {
            config.startup_timeout_secs = secs;
        }
        if let Some(secs) = self.http_timeout {
            config.http_client_timeout_secs = secs;
        }
        if let Some(ms) = self.poll_interval {
            config.event_poll_interval_ms = ms;
        }
        if let Some(ms) = self.result_wait {
            config.result_wait_ms = ms;
        }
        if let Some(port) = self.port {
            config.pod_port = port;
        }
        if let Some(route) = self.route {
            config.route = route;
        }
    }
}

/// Parse a numeric variable; unparsable values count as unset
fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Print the recognised environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  KUBERNETES_MASTER              Cluster API endpoint (required)");
    println!("  DOCKER_URL                     Docker registry endpoint (required)");
    println!("  DOCKER_PASSWORD                Registry / cluster password");
    println!("  {ENV_PREFIX}_USERNAME          Registry / cluster user");
    println!("  {ENV_PREFIX}_EMAIL             Registry account email");
    println!("  {ENV_PREFIX}_ADDRESS           Registry account address");
    println!("  {ENV_PREFIX}_NAMESPACE         Namespace of the test deployment");
    println!("  {ENV_PREFIX}_API_VERSION       Core API version (default v1)");
    println!("  {ENV_PREFIX}_IMAGE             Test image name");
    println!("  {ENV_PREFIX}_STARTUP_TIMEOUT   Seconds to wait for a ready pod");
    println!("  {ENV_PREFIX}_HTTP_TIMEOUT      HTTP timeout in seconds");
    println!("  {ENV_PREFIX}_POLL_INTERVAL     Event poll interval in milliseconds");
    println!("  {ENV_PREFIX}_RESULT_WAIT       Milliseconds to wait for a test result");
    println!("  {ENV_PREFIX}_PORT              Servlet port inside the pod");
    println!("  {ENV_PREFIX}_ROUTE             direct | master");
    println!("  {ENV_PREFIX}_CONFIG            Path to configuration file");
    println!("  KUBECONFIG                     Path to kubeconfig file");
    println!();
    println!("Example:");
    println!("  export KUBERNETES_MASTER=https://master.example.com:8443");
    println!("  export DOCKER_URL=registry.example.com:5000");
    println!("  pod-invoker find --label deploymentConfig=jws-app");
}
