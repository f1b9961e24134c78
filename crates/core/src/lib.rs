//! Shared domain types for the photo-studio job engine.
//!
//! This crate has no internal dependencies so it can be used by the
//! notification bus, the job tracker, and any UI binding layered on top.

pub mod job;
pub mod results;
pub mod studio;
pub mod types;
