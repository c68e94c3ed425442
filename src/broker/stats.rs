// src/broker/stats.rs

//! Per-channel statistics
//!
//! Monotonic counters updated with relaxed atomics outside any broker lock.
//! No cross-field consistency is promised between two counters of one
//! snapshot.

use alloc::string::String;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Capabilities, ChannelInfo};

#[derive(Debug, Default)]
pub(super) struct Counter(AtomicU64);

impl Counter {
    #[inline]
    pub(super) fn inc(&self) {
        self.add(1);
    }

    #[inline]
    pub(super) fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    #[inline]
    pub(super) fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub(super) struct ChannelCounters {
    pub(super) bytes_xfer: Counter,
    pub(super) cmd_alloc: Counter,
    pub(super) cmd_post: Counter,
    pub(super) cmd_poll: Counter,
    pub(super) notify_poll: Counter,
    pub(super) notify_pending: Counter,
}

impl ChannelCounters {
    pub(super) fn snapshot(&self, name: &str, info: &ChannelInfo) -> ChannelStats {
        ChannelStats {
            name: String::from(name),
            id: info.id,
            capabilities: info.capabilities,
            bytes_xfer: self.bytes_xfer.get(),
            cmd_alloc: self.cmd_alloc.get(),
            cmd_post: self.cmd_post.get(),
            cmd_poll: self.cmd_poll.get(),
            notify_poll: self.notify_poll.get(),
            notify_pending: self.notify_pending.get(),
        }
    }
}

/// Published statistics of one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    /// `<driver>:<instance>:channel<N>`
    pub name: String,
    pub id: u64,
    pub capabilities: Capabilities,
    /// Bytes submitted by posted copy commands
    pub bytes_xfer: u64,
    /// Command allocation attempts
    pub cmd_alloc: u64,
    pub cmd_post: u64,
    pub cmd_poll: u64,
    /// Commands examined by the completion notifier
    pub notify_poll: u64,
    /// Notifier passes that stopped at a pending command
    pub notify_pending: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    #[test]
    fn snapshot_copies_identity_and_counters() {
        let counters = ChannelCounters::default();
        counters.cmd_post.inc();
        counters.cmd_post.inc();
        counters.bytes_xfer.add(8192);

        let info = ChannelInfo {
            id: 0xfeed,
            capabilities: Capabilities::COPY | Capabilities::DCA,
            queue_depth: 64,
            channel_number: 2,
            root: Some(NodeId(9)),
        };
        let stats = counters.snapshot("ioat:0:channel2", &info);
        assert_eq!(stats.name, "ioat:0:channel2");
        assert_eq!(stats.id, 0xfeed);
        assert_eq!(stats.capabilities, Capabilities::COPY | Capabilities::DCA);
        assert_eq!(stats.cmd_post, 2);
        assert_eq!(stats.bytes_xfer, 8192);
        assert_eq!(stats.notify_poll, 0);
    }
}
