//! Public API module.
//!
//! Configuration and the data and error types shared by every stage of the
//! lifecycle.

pub mod config;
pub mod models;
