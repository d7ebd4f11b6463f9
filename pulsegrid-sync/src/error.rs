//! Service error type
//!
//! Re-exports the shared PulseGrid error so service modules use one
//! `crate::error::{Error, Result}` path.

pub use pulsegrid_common::error::{Error, Result};
