//! # PulseGrid Common Library
//!
//! Shared code for the PulseGrid services including:
//! - Error types
//! - API request/response types
//! - Configuration loading
//! - Time utilities

pub mod api;
pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
