//! Output formatters for invocation results
//!
//! Provides table, JSON and summary renderings.

use serde::Serialize;

use crate::models::{TestResult, TestStatus, TestTarget};

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// JSON shape of one invocation
#[derive(Serialize)]
struct Report<'a> {
    test: String,
    #[serde(flatten)]
    result: &'a TestResult,
}

/// JSON shape of a pod lookup
#[derive(Serialize)]
struct PodReport<'a> {
    selector: &'a str,
    index: usize,
    address: &'a str,
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format the result of invoking `target`
    pub fn format_result(&self, target: &TestTarget, result: &TestResult) -> String {
        let report = Report {
            test: target.to_string(),
            result,
        };
        match self.format {
            OutputFormat::Table => self.format_result_table(target, result),
            OutputFormat::Json => serde_json::to_string(&report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&report).unwrap_or_default(),
            OutputFormat::Summary => format!("{} {}", result.status.symbol(), target),
        }
    }

    fn format_result_table(&self, target: &TestTarget, result: &TestResult) -> String {
        let status = self.status_label(result.status);
        let duration = result
            .duration_ms()
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());

        let mut output = format!("{:50} {} [{:>8}]", target.to_string(), status, duration);
        if let Some(description) = &result.description {
            output.push_str(&format!("\n  {description}"));
        }
        if let Some(throwable) = &result.throwable {
            for line in throwable.lines() {
                output.push_str(&format!("\n  {line}"));
            }
        }
        output
    }

    fn status_label(&self, status: TestStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return label;
        }
        let color = match status {
            TestStatus::Passed => "32",
            TestStatus::Failed => "31",
            TestStatus::Skipped => "33",
        };
        format!("\x1b[{color}m{label}\x1b[0m")
    }

    /// Format a located pod address
    pub fn format_pod(&self, selector: &str, index: usize, address: &str) -> String {
        let report = PodReport {
            selector,
            index,
            address,
        };
        match self.format {
            OutputFormat::Table => format!("{selector} [{index}] -> {address}"),
            OutputFormat::Json => serde_json::to_string(&report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&report).unwrap_or_default(),
            OutputFormat::Summary => address.to_string(),
        }
    }
}
