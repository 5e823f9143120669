//! Core library for LaunchKit
//!
//! This crate contains the capability core, including:
//! - Configuration registry loaded once from environment input
//! - Capability predicates over features and providers
//! - Provider factories for auth, database and payments

pub mod config;
pub mod error;
pub mod providers;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
