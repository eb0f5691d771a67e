//! Contact enrichment pipeline library.
//!
//! Exposes the configuration, storage and service layers so integration
//! tests and embedders can drive the pipeline directly.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod migration;
pub mod models;
pub mod services;
