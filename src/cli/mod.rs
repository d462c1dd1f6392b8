//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Configuration, RouteMode};
use crate::models::{deployment_name, Deployment, Dispatch, LabelSet, TestTarget};

/// Locate ready test pods and invoke tests inside them
#[derive(Parser, Debug)]
#[command(name = "pod-invoker")]
#[command(version)]
#[command(about = "Locate ready pods by label and invoke in-container tests")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Namespace to search for pods
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// How requests reach pods (direct, master)
    #[arg(long, global = true)]
    pub route: Option<String>,

    /// Cluster API endpoint
    #[arg(long, global = true)]
    pub master: Option<String>,
}

impl Args {
    /// Command-line values take precedence over file and environment
    pub fn apply(&self, config: &mut Configuration) -> Result<(), String> {
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(master) = &self.master {
            config.kubernetes_master = Some(master.clone());
        }
        if let Some(route) = &self.route {
            config.route = RouteMode::from_str(route)
                .ok_or_else(|| format!("Unknown route '{route}', expected direct or master"))?;
        }
        Ok(())
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find the address of a ready pod
    Find(FindArgs),

    /// Print the URL of a path on a pod
    Url(UrlArgs),

    /// Invoke a test method inside a pod
    Invoke(InvokeArgs),

    /// POST to a path on a ready pod and print the answer
    Exec(ExecArgs),

    /// Show or manage configuration
    Config(ConfigArgs),
}

/// Arguments for find command
#[derive(Parser, Debug)]
pub struct FindArgs {
    /// Pod labels (key=value, repeatable or comma-separated)
    #[arg(short, long = "label", required = true)]
    pub labels: Vec<String>,

    /// Ordinal among ready pods
    #[arg(short, long, default_value = "0")]
    pub index: usize,

    /// Wait up to the startup timeout for the pod to become ready
    #[arg(short, long)]
    pub wait: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl FindArgs {
    pub fn labels(&self) -> Result<LabelSet, String> {
        LabelSet::parse_pairs(&self.labels)
    }
}

/// Arguments for url command
#[derive(Parser, Debug)]
pub struct UrlArgs {
    /// Pod IP, or pod name when routing through the master
    #[arg(long)]
    pub host: String,

    /// Pod port (defaults to the configured pod port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path on the pod
    #[arg(long, default_value = "")]
    pub path: String,

    /// Query string
    #[arg(short, long, default_value = "")]
    pub query: String,
}

/// Arguments for invoke command
#[derive(Parser, Debug)]
#[command(group(
    ArgGroup::new("dispatch")
        .args(["index", "operate_on_deployment", "run_in_pod", "container"])
))]
pub struct InvokeArgs {
    /// Deployment archive or name, e.g. app.war
    #[arg(short, long)]
    pub deployment: String,

    /// Context root (defaults to the deployment name)
    #[arg(long)]
    pub context: Option<String>,

    /// Pod labels overriding the deployment's default label
    #[arg(short, long = "label")]
    pub labels: Vec<String>,

    /// Test class
    #[arg(short, long)]
    pub class: String,

    /// Test method
    #[arg(short, long)]
    pub method: String,

    /// Ordinal among ready pods
    #[arg(short, long)]
    pub index: Option<usize>,

    /// Run in the first ready pod of the deployment
    #[arg(long)]
    pub operate_on_deployment: bool,

    /// Run in the shared run-in-pod deployment
    #[arg(long)]
    pub run_in_pod: bool,

    /// Target container name; its trailing number selects the pod
    #[arg(long)]
    pub container: Option<String>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl InvokeArgs {
    pub fn dispatch(&self) -> Dispatch {
        if self.run_in_pod {
            Dispatch::RunInPod
        } else if self.operate_on_deployment {
            Dispatch::Deployment
        } else if let Some(container) = &self.container {
            Dispatch::for_container(container)
        } else {
            Dispatch::Indexed(self.index.unwrap_or(0))
        }
    }

    pub fn target(&self) -> TestTarget {
        TestTarget::new(&self.class, &self.method).with_dispatch(self.dispatch())
    }

    pub fn deployment(&self) -> Result<Deployment, String> {
        let context = self
            .context
            .clone()
            .unwrap_or_else(|| deployment_name(&self.deployment).to_string());
        let deployment = Deployment::new(&self.deployment, context);

        if self.labels.is_empty() {
            Ok(deployment)
        } else {
            Ok(deployment.with_labels(LabelSet::parse_pairs(&self.labels)?))
        }
    }
}

/// Arguments for exec command
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Pod labels (key=value, repeatable or comma-separated)
    #[arg(short, long = "label", required = true)]
    pub labels: Vec<String>,

    /// Ordinal among ready pods
    #[arg(short, long, default_value = "0")]
    pub index: usize,

    /// Path on the pod
    #[arg(short, long)]
    pub path: String,
}

impl ExecArgs {
    pub fn labels(&self) -> Result<LabelSet, String> {
        LabelSet::parse_pairs(&self.labels)
    }
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved configuration
    Show {
        /// Output format (text, yaml, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate the resolved configuration
    Validate,

    /// Write an example configuration file
    Init {
        /// Destination (defaults to ./pod-invoker.yaml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_args() {
        let args = Args::parse_from([
            "pod-invoker",
            "find",
            "-l",
            "app=web",
            "--label",
            "tier=front",
            "--index",
            "2",
            "--wait",
        ]);
        match args.command {
            Command::Find(find) => {
                assert_eq!(find.labels().unwrap().to_selector(), "app=web,tier=front");
                assert_eq!(find.index, 2);
                assert!(find.wait);
                assert_eq!(find.format, "table");
            }
            _ => panic!("Expected Find command"),
        }
    }

    #[test]
    fn test_invoke_defaults() {
        let args = Args::parse_from([
            "pod-invoker",
            "invoke",
            "--deployment",
            "jws-app.war",
            "--class",
            "org.acme.PingTest",
            "--method",
            "ping",
        ]);
        match args.command {
            Command::Invoke(invoke) => {
                let deployment = invoke.deployment().unwrap();
                assert_eq!(deployment.context_root, "/jws-app");
                assert_eq!(deployment.labels.to_selector(), "deploymentConfig=jws-app");
                assert_eq!(invoke.dispatch(), Dispatch::Indexed(0));
                assert_eq!(invoke.target().to_string(), "org.acme.PingTest#ping");
            }
            _ => panic!("Expected Invoke command"),
        }
    }

    #[test]
    fn test_invoke_dispatch_flags() {
        let parse = |extra: &[&str]| {
            let mut argv = vec!["pod-invoker", "invoke", "-d", "app", "-c", "A", "-m", "b"];
            argv.extend_from_slice(extra);
            match Args::try_parse_from(argv).map(|a| a.command) {
                Ok(Command::Invoke(invoke)) => Ok(invoke.dispatch()),
                Ok(_) => panic!("Expected Invoke command"),
                Err(e) => Err(e),
            }
        };

        assert_eq!(parse(&["--run-in-pod"]).unwrap(), Dispatch::RunInPod);
        assert_eq!(parse(&["--operate-on-deployment"]).unwrap(), Dispatch::Deployment);
        assert_eq!(parse(&["--container", "pod-3"]).unwrap(), Dispatch::Indexed(3));
        assert_eq!(parse(&["--index", "1"]).unwrap(), Dispatch::Indexed(1));
        assert!(parse(&["--index", "1", "--run-in-pod"]).is_err());
    }

    #[test]
    fn test_invoke_label_override() {
        let args = Args::parse_from([
            "pod-invoker", "invoke", "-d", "app.war", "--context", "/", "-l", "app=custom", "-c",
            "A", "-m", "b",
        ]);
        match args.command {
            Command::Invoke(invoke) => {
                let deployment = invoke.deployment().unwrap();
                assert_eq!(deployment.context_root, "");
                assert_eq!(deployment.labels.to_selector(), "app=custom");
            }
            _ => panic!("Expected Invoke command"),
        }
    }

    #[test]
    fn test_global_overrides() {
        let args = Args::parse_from([
            "pod-invoker",
            "config",
            "show",
            "--namespace",
            "cearq",
            "--route",
            "master",
            "--master",
            "https://master:8443",
        ]);
        let mut config = Configuration::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.namespace, "cearq");
        assert_eq!(config.route, RouteMode::Master);
        assert_eq!(config.master(), "https://master:8443");
        assert!(matches!(
            args.command,
            Command::Config(ConfigArgs {
                action: ConfigAction::Show { .. }
            })
        ));
    }

    #[test]
    fn test_unknown_route_rejected() {
        let args = Args::parse_from(["pod-invoker", "--route", "tunnel", "config", "env"]);
        assert!(args.apply(&mut Configuration::default()).is_err());
    }

    #[test]
    fn test_exec_requires_label() {
        assert!(Args::try_parse_from(["pod-invoker", "exec", "--path", "/ping"]).is_err());
    }
}
