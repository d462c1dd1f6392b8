//! Data models for pod selection and test invocation
//!
//! This module contains the data structures shared by the locator, the
//! proxy and the invoker.

mod event;
mod labels;
mod target;
mod test_result;

pub use event::CommandEvent;
pub use labels::{deployment_name, LabelSet};
pub use target::{Deployment, Dispatch, TestTarget, RUN_IN_POD_CONTEXT, SERVLET_MAPPING};
pub use test_result::{TestResult, TestStatus};
