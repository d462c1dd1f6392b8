//! Output formatting module
//!
//! Renders invocation results and pod lookups for the terminal.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
