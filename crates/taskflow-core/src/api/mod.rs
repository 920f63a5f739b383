//! HTTP client for the TaskFlow backend.

mod client;

pub use client::ApiClient;
