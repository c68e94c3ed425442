// src/constants.rs

//! Broker constants and default configuration values
//!
//! This module centralizes the constant values used throughout the broker,
//! including the query version, the classic integer status codes and the
//! defaults that [`BrokerConfig`](crate::config::BrokerConfig) starts from.

/// Version reported by [`Broker::query`](crate::Broker::query)
pub const QUERY_VERSION: u32 = 0;

/// Entries per channel requested from a backend at registration
pub const DEFAULT_QUEUE_DEPTH: u32 = 1024;

/// Compatible string carried by an interconnect root node
pub const ROOT_COMPLEX_COMPATIBLE: &str = "pciex_root_complex";

/// Classic integer status codes
///
/// Backends written against an integer status convention can translate
/// results with [`BrokerError::status_code`](crate::BrokerError::status_code),
/// [`CmdStatus::status_code`](crate::CmdStatus::status_code) and
/// [`UnregisterStatus::status_code`](crate::UnregisterStatus::status_code).
pub mod status {
    /// Operation completed
    pub const SUCCESS: i32 = 0;
    /// Operation rejected or hardware reported an error
    pub const FAILURE: i32 = -1;
    /// No channel eligible under the current policy
    pub const NORESOURCES: i32 = -2;
    /// Operation accepted, not yet complete
    pub const PENDING: i32 = 1;
}

/// Name prefix of a channel's published statistics
pub const CHANNEL_STATS_PREFIX: &str = "channel";
