//! # SRM Common Library
//!
//! Shared code for the student record services:
//! - Error types
//! - Configuration loading and root folder resolution
//! - SQLite initialization and schema
//! - Credential issuing and verification for the HTTP API

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
