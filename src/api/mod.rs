//! Typed HTTP client for the console backend.

mod client;

pub use client::{ApiClient, ApiError};
