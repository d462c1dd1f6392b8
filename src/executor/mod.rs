//! Test execution
//!
//! Invokes test methods in pods and relays the events they emit.

mod events;
mod runner;

pub use events::{EventPoller, LoggingCallback};
pub use runner::TestInvoker;
