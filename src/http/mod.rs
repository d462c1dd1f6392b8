//! HTTP client module
//!
//! Provides the HTTP client used to reach test pods.

mod client;

pub use client::{HttpClient, HttpRequest, HttpResponse, TlsMaterial};
