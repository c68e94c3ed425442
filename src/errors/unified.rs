// src/errors/unified.rs

//! Unified error types for the broker
//!
//! This module provides a consistent error handling approach across
//! registration, allocation, command and completion paths.

use core::fmt;

use crate::constants::status;

/// Top-level broker error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// No channel is eligible under the current allocation policy
    NoResources,
    /// Operation rejected, or hardware reported an error
    Failure(FailureKind),
}

impl BrokerError {
    /// Backend refused the request
    pub const REJECTED: Self = BrokerError::Failure(FailureKind::Rejected);
    /// Backend reported a hardware error
    pub const HARDWARE: Self = BrokerError::Failure(FailureKind::Hardware);

    /// Classic integer status code for this error
    pub const fn status_code(&self) -> i32 {
        match self {
            BrokerError::NoResources => status::NORESOURCES,
            BrokerError::Failure(_) => status::FAILURE,
        }
    }

    /// Whether this is a `Failure` of the given kind
    pub const fn is_failure_kind(&self, kind: FailureKind) -> bool {
        match self {
            BrokerError::Failure(k) => *k as u8 == kind as u8,
            BrokerError::NoResources => false,
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::NoResources => write!(f, "no resources"),
            BrokerError::Failure(kind) => write!(f, "failure: {}", kind),
        }
    }
}

/// Reasons behind a [`BrokerError::Failure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FailureKind {
    /// Backend refused the request
    Rejected,
    /// Backend reported a hardware error for the command
    Hardware,
    /// Blocking poll on a command posted without interrupt completion
    NotWaitable,
    /// Malformed request
    InvalidArgument,
    /// Channel no longer registered
    ChannelGone,
    /// Device already unregistered and cleaned up
    DeviceGone,
    /// No final result recorded for the command yet
    Unresolved,
}

impl FailureKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Rejected => "rejected by backend",
            FailureKind::Hardware => "hardware error",
            FailureKind::NotWaitable => "command is not waitable",
            FailureKind::InvalidArgument => "invalid argument",
            FailureKind::ChannelGone => "channel gone",
            FailureKind::DeviceGone => "device gone",
            FailureKind::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FailureKind> for BrokerError {
    fn from(kind: FailureKind) -> Self {
        BrokerError::Failure(kind)
    }
}

/// Result type alias for broker operations
pub type Result<T> = core::result::Result<T, BrokerError>;

/// Helper trait for error context
pub trait ErrorContext {
    /// Get a detailed description of the error
    fn context(&self) -> &'static str;
}

impl ErrorContext for BrokerError {
    fn context(&self) -> &'static str {
        match self {
            BrokerError::NoResources => {
                "Pool is empty, or an exclusive request would leave no shared channel"
            }
            BrokerError::Failure(kind) => kind.context(),
        }
    }
}

impl ErrorContext for FailureKind {
    fn context(&self) -> &'static str {
        match self {
            FailureKind::Rejected => "Backend refused to allocate or accept the request",
            FailureKind::Hardware => "Backend reported a hardware error for the command",
            FailureKind::NotWaitable => {
                "Blocking poll requires the command to be posted with INTR"
            }
            FailureKind::InvalidArgument => "Request flags or operands are inconsistent",
            FailureKind::ChannelGone => "Channel was unregistered and destroyed",
            FailureKind::DeviceGone => "Device was already unregistered and cleaned up",
            FailureKind::Unresolved => "Command has no final result recorded",
        }
    }
}
