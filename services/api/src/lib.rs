//! services/api/src/lib.rs
//!
//! The library crate for the API service. The binary in `src/bin/api.rs`
//! wires these modules together; integration tests build the same router
//! against in-memory adapters.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
