//! Test targets and deployments
//!
//! A test case carries an explicit descriptor saying which pod it runs in;
//! nothing is discovered by inspecting the test code.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::LabelSet;

/// Servlet mapping of the in-pod test runner
pub const SERVLET_MAPPING: &str = "/ArquillianServletRunner";

/// Context root of the shared run-in-pod deployment
pub const RUN_IN_POD_CONTEXT: &str = "/runinpod";

/// Deployment name of the shared run-in-pod deployment
pub const RUN_IN_POD_DEPLOYMENT: &str = "runinpod";

/// How a test picks its pod
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "index", rename_all = "snake_case")]
pub enum Dispatch {
    /// The n-th ready pod of the deployment
    Indexed(usize),
    /// First ready pod of the deployment the test operates on
    Deployment,
    /// First ready pod of the run-in-pod deployment
    RunInPod,
}

impl Default for Dispatch {
    fn default() -> Self {
        Dispatch::Indexed(0)
    }
}

impl Dispatch {
    /// Index from a target container name such as `pod-2`; defaults to 0
    pub fn for_container(name: &str) -> Self {
        let digits: String = name
            .chars()
            .rev()
            .take_while(char::is_ascii_digit)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Dispatch::Indexed(digits.parse().unwrap_or(0))
    }

    /// Ordinal index among ready pods
    pub fn index(&self) -> usize {
        match self {
            Dispatch::Indexed(n) => *n,
            Dispatch::Deployment | Dispatch::RunInPod => 0,
        }
    }
}

/// A single test method to invoke in a pod
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTarget {
    pub class_name: String,
    pub method_name: String,
    #[serde(default)]
    pub dispatch: Dispatch,
}

impl TestTarget {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            dispatch: Dispatch::default(),
        }
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Query string of the invocation request
    pub fn query(&self) -> String {
        format!(
            "outputMode=serializedObject&className={}&methodName={}",
            self.class_name, self.method_name
        )
    }

    /// Query string of the event poll request
    pub fn event_query(&self) -> String {
        format!("{}&cmd=event", self.query())
    }
}

impl fmt::Display for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

/// The deployment under test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    pub labels: LabelSet,
    pub context_root: String,
}

impl Deployment {
    /// Deployment whose pods carry the default deployment label
    pub fn new(name: impl Into<String>, context_root: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            labels: LabelSet::for_deployment(&name),
            context_root: normalize_context(&context_root.into()),
            name,
        }
    }

    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }

    /// The shared deployment used by run-in-pod tests
    pub fn run_in_pod() -> Self {
        Self::new(RUN_IN_POD_DEPLOYMENT, RUN_IN_POD_CONTEXT)
    }
}

fn normalize_context(context: &str) -> String {
    let trimmed = context.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
