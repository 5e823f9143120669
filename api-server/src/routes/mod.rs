//! Route handlers
//!
//! Handlers hold no state and contain no business logic: they parse the
//! request, short-circuit on the relevant capability predicate, validate
//! required fields, delegate to exactly one provider operation and map the
//! result onto an HTTP response.

pub mod auth;
pub mod config;
pub mod database;
pub mod health;
pub mod payments;
pub mod records;
pub mod respond;
