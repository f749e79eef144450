//! Application-level error handling.

pub mod error;
