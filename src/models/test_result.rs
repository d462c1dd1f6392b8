//! Test result returned by the in-pod runner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single test invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "○",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASSED"),
            TestStatus::Failed => write!(f, "FAILED"),
            TestStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Result of one test method
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub status: TestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Failure message and stack trace, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throwable: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TestResult {
    pub fn passed() -> Self {
        Self::with_status(TestStatus::Passed)
    }

    pub fn failed(throwable: impl Into<String>) -> Self {
        Self {
            throwable: Some(throwable.into()),
            ..Self::with_status(TestStatus::Failed)
        }
    }

    pub fn skipped(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::with_status(TestStatus::Skipped)
        }
    }

    fn with_status(status: TestStatus) -> Self {
        Self {
            status,
            description: None,
            throwable: None,
            start: None,
            end: None,
        }
    }

    /// Duration reported by the runner, when both timestamps are present
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.symbol(), self.status)?;
        if let Some(ms) = self.duration_ms() {
            write!(f, " ({ms}ms)")?;
        }
        if let Some(throwable) = &self.throwable {
            write!(f, " - {}", throwable.lines().next().unwrap_or_default())?;
        }
        Ok(())
    }
}
