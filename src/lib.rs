//! Multi-tier cache layer for the tenancy and inspection platform.
//!
//! See [`cache`] for the cache primitives and [`cache::CacheContext`] for
//! wiring them together.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
