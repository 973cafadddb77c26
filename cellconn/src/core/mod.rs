//! Core lifecycle logic.
//!
//! One module per stage (power, interface, resolver, session), the retry
//! budget, and the state machine that composes them.

pub(crate) mod interface;
pub(crate) mod lifecycle;
pub(crate) mod power;
pub(crate) mod resolver;
pub(crate) mod retry;
pub(crate) mod session;
