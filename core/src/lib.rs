//! Shared building blocks for the control-plane tool server: connection
//! settings, the error taxonomy, wire/tool models and their conversion.

pub mod config;
pub mod convert;
pub mod error;
pub mod models;
pub mod overrides;
