// src/config.rs

//! Broker configuration

use crate::constants::{DEFAULT_QUEUE_DEPTH, ROOT_COMPLEX_COMPATIBLE};
use crate::types::ChannelAllocFlags;

/// Broker configuration
///
/// Fixed for the lifetime of a [`Broker`](crate::Broker).
#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    /// Entries per channel requested from a backend at registration
    /// Default: 1024
    pub queue_depth: u32,

    /// Flags passed to the backend's channel allocator
    /// Default: `SLEEP`
    pub channel_alloc_flags: ChannelAllocFlags,

    /// Compatible string identifying an interconnect root node
    pub root_complex_compatible: &'static str,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            channel_alloc_flags: ChannelAllocFlags::SLEEP,
            root_complex_compatible: ROOT_COMPLEX_COMPATIBLE,
        }
    }
}

impl BrokerConfig {
    /// Override the per-channel queue depth
    #[must_use]
    pub const fn with_queue_depth(mut self, queue_depth: u32) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Override the channel allocation flags
    #[must_use]
    pub const fn with_channel_alloc_flags(mut self, flags: ChannelAllocFlags) -> Self {
        self.channel_alloc_flags = flags;
        self
    }

    /// Override the compatible string that marks an interconnect root
    #[must_use]
    pub const fn with_root_complex_compatible(mut self, compatible: &'static str) -> Self {
        self.root_complex_compatible = compatible;
        self
    }
}
