// src/errors/mod.rs

//! Unified error handling module
//!
//! Every fallible broker operation returns [`BrokerError`]. Success and
//! "accepted, still pending" outcomes are `Ok` values
//! ([`CmdStatus`](crate::CmdStatus), [`UnregisterStatus`](crate::UnregisterStatus)).

pub mod unified;

pub use unified::{BrokerError, ErrorContext, FailureKind, Result};
