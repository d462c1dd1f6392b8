//! pod-invoker - run in-container tests against ready Kubernetes pods
//!
//! Locates the n-th ready pod of a deployment by label, builds the URL of
//! the in-pod test runner (directly or through the API server's pod proxy)
//! and invokes a test method there, relaying the events it emits.
//!
//! ## Usage
//!
//! ```bash
//! # Address of the first ready pod of a deployment
//! pod-invoker find --label deploymentConfig=jws-app
//!
//! # Run a test method in the second pod
//! pod-invoker invoke --deployment jws-app.war --class org.acme.PingTest --method ping --index 1
//!
//! # Run a test in the shared run-in-pod deployment
//! pod-invoker invoke --deployment jws-app.war --class org.acme.PingTest --method ping --run-in-pod
//!
//! # Show resolved configuration
//! pod-invoker config show
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

mod cli;
mod config;
mod error;
mod executor;
mod http;
mod k8s;
mod models;
mod output;
mod proxy;
mod utils;

use cli::Args;
use config::Configuration;
use executor::{EventPoller, LoggingCallback, TestInvoker};
use models::TestStatus;
use output::{OutputFormat, ResultFormatter};
use proxy::RequestProxy;
use utils::{init_logger, LogLevel};

const DEFAULT_CONFIG_PATH: &str = "./pod-invoker.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(LogLevel::from_flags(args.verbose, args.log_level.as_deref()));

    let mut config =
        Configuration::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config).map_err(anyhow::Error::msg)?;
    let config = Arc::new(config);

    match args.command {
        cli::Command::Find(find_args) => {
            find_pod(config, find_args).await?;
        }
        cli::Command::Url(url_args) => {
            print_url(&config, url_args);
        }
        cli::Command::Invoke(invoke_args) => {
            let status = invoke_test(config, invoke_args).await?;
            if status == TestStatus::Failed {
                std::process::exit(1);
            }
        }
        cli::Command::Exec(exec_args) => {
            exec_path(config, exec_args).await?;
        }
        cli::Command::Config(config_args) => {
            manage_config(&config, config_args)?;
        }
    }

    Ok(())
}

fn formatter(format: &str) -> Result<ResultFormatter> {
    let format = OutputFormat::from_str(format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {format}"))?;
    let formatter = ResultFormatter::new(format);
    if std::io::stdout().is_terminal() {
        Ok(formatter)
    } else {
        Ok(formatter.no_color())
    }
}

async fn connect(config: Arc<Configuration>) -> Result<RequestProxy> {
    RequestProxy::connect(config)
        .await
        .context("Failed to connect to the cluster")
}

async fn find_pod(config: Arc<Configuration>, args: cli::FindArgs) -> Result<()> {
    let labels = args.labels().map_err(anyhow::Error::msg)?;
    let formatter = formatter(&args.format)?;
    let proxy = connect(config.clone()).await?;

    let address = if args.wait {
        info!(
            "Waiting up to {}s for pod {} of [{}]",
            config.startup_timeout_secs, args.index, labels
        );
        proxy
            .locator()
            .wait_for_pod(&labels, args.index, config.startup_timeout())
            .await?
    } else {
        proxy.find_pod(&labels, args.index).await?
    };

    println!(
        "{}",
        formatter.format_pod(&labels.to_selector(), args.index, &address)
    );
    Ok(())
}

fn print_url(config: &Configuration, args: cli::UrlArgs) {
    let port = args.port.unwrap_or(config.pod_port);
    println!(
        "{}",
        proxy::pod_url(config, &args.host, port, &args.path, &args.query)
    );
}

async fn invoke_test(config: Arc<Configuration>, args: cli::InvokeArgs) -> Result<TestStatus> {
    let deployment = args.deployment().map_err(anyhow::Error::msg)?;
    let target = args.target();
    let formatter = formatter(&args.format)?;

    let proxy = Arc::new(connect(config.clone()).await?);
    let poller = Arc::new(EventPoller::new(
        proxy.clone(),
        config.event_poll_interval(),
        Arc::new(LoggingCallback),
    ));
    let invoker = TestInvoker::new(proxy, poller, deployment, &config);

    info!(
        "Running {} against deployment {}",
        target,
        invoker.deployment().name
    );

    let result = invoker
        .invoke(&target)
        .await
        .with_context(|| format!("Failed to invoke {target}"))?;

    println!("{}", formatter.format_result(&target, &result));
    Ok(result.status)
}

async fn exec_path(config: Arc<Configuration>, args: cli::ExecArgs) -> Result<()> {
    let labels = args.labels().map_err(anyhow::Error::msg)?;
    let proxy = connect(config).await?;

    let body = proxy
        .exec(&labels, args.index, &args.path)
        .await
        .with_context(|| format!("Failed to exec {}", args.path))?;

    println!("{body}");
    Ok(())
}

fn manage_config(config: &Configuration, args: cli::ConfigArgs) -> Result<()> {
    use config::print_env_help;

    match args.action {
        cli::ConfigAction::Show { format } => {
            let mut shown = config.clone();
            if !shown.password.is_empty() {
                shown.password = "******".to_string();
            }
            match format.to_lowercase().as_str() {
                "text" => config.print_summary(),
                "yaml" => print!("{}", serde_yaml::to_string(&shown)?),
                "json" => println!("{}", serde_json::to_string_pretty(&shown)?),
                other => anyhow::bail!("Unknown config format: {other}"),
            }
        }

        cli::ConfigAction::Validate => match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
            }
            Err(e) => {
                println!("✗ Configuration is invalid");
                println!("  Error: {e}");
                return Err(e.into());
            }
        },

        cli::ConfigAction::Init { path, force } => {
            let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            init_config(&path, force)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Env => {
            print_env_help();
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }
    config::ConfigFile::example()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}
