//! Label sets used to select test pods

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Label key the deployer stamps on every pod of a test deployment
pub const DEPLOYMENT_LABEL: &str = "deploymentConfig";

/// Deployment name of an archive, without its `.war`/`.ear`/`.jar` extension
pub fn deployment_name(archive: &str) -> &str {
    [".war", ".ear", ".jar"]
        .iter()
        .find_map(|ext| archive.strip_suffix(ext))
        .unwrap_or(archive)
}

/// Exact-match filter over pod labels
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels of the pods created for deployment `name`.
    ///
    /// The archive extension (`.war`, `.ear`, `.jar`) is not part of the
    /// deployment name.
    pub fn for_deployment(name: &str) -> Self {
        Self::new().with(DEPLOYMENT_LABEL, deployment_name(name))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Kubernetes equality selector, e.g. `app=web,tier=front`
    pub fn to_selector(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// True if every label in the set is present with the same value
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.0.iter().all(|(key, value)| {
            labels
                .and_then(|l| l.get(key))
                .is_some_and(|actual| actual == value)
        })
    }

    /// Parse `key=value` pairs, as given on the command line
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            for part in pair.split(',').filter(|p| !p.trim().is_empty()) {
                let (key, value) = part
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid label '{part}', expected key=value"))?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(format!("Invalid label '{part}', empty key"));
                }
                labels.insert(key, value.trim());
            }
        }
        Ok(labels)
    }
}

impl FromStr for LabelSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_pairs([s])
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_selector())
    }
}
