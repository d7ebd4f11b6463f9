//! HTTP API
//!
//! Request handlers and axum server setup for the synchronizer endpoints.

pub mod handlers;
pub mod server;

pub use server::{create_router, AppContext};
