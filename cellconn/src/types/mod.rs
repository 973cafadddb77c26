//! Types and constants shared across the crate.

pub(crate) mod constants;
