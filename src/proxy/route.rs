//! URL construction for pod requests

use crate::config::{Configuration, RouteMode};

/// URL of `path?query` on `host:port`, routed as configured.
///
/// `host` is the pod IP for direct routing and the pod name when going
/// through the API server's pod proxy.
pub fn pod_url(config: &Configuration, host: &str, port: u16, path: &str, query: &str) -> String {
    let path = normalize_path(path);
    let query = query.trim_start_matches('?');

    let base = match config.route {
        RouteMode::Direct => format!("http://{host}:{port}{path}"),
        RouteMode::Master => format!(
            "{}/api/{}/namespaces/{}/pods/{host}:{port}/proxy{path}",
            config.master(),
            config.api_version,
            config.namespace
        ),
    };

    if query.is_empty() {
        base
    } else {
        format!("{base}?{query}")
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(route: RouteMode) -> Configuration {
        Configuration {
            kubernetes_master: Some("https://localhost:8443/".to_string()),
            namespace: "cearq-jws".to_string(),
            route,
            ..Default::default()
        }
    }

    #[test]
    fn test_direct_url() {
        let url = pod_url(
            &config(RouteMode::Direct),
            "10.1.0.7",
            8080,
            "/app/ArquillianServletRunner",
            "outputMode=serializedObject&className=A&methodName=b",
        );
        assert_eq!(
            url,
            "http://10.1.0.7:8080/app/ArquillianServletRunner?outputMode=serializedObject&className=A&methodName=b"
        );
    }

    #[test]
    fn test_master_url() {
        let url = pod_url(&config(RouteMode::Master), "jws-app-1-x7k2p", 8080, "/health", "");
        assert_eq!(
            url,
            "https://localhost:8443/api/v1/namespaces/cearq-jws/pods/jws-app-1-x7k2p:8080/proxy/health"
        );
    }

    #[test]
    fn test_path_and_query_normalized() {
        let url = pod_url(&config(RouteMode::Direct), "pod", 9000, "status", "?verbose=true");
        assert_eq!(url, "http://pod:9000/status?verbose=true");

        let url = pod_url(&config(RouteMode::Direct), "pod", 9000, "", "");
        assert_eq!(url, "http://pod:9000");
    }
}
