// src/types.rs

//! Shared value types: identities, flag sets, channel/device descriptions
//! and command operands.

use bitflags::bitflags;

use crate::constants::status;

/// Opaque identity of a node in the platform device tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

bitflags! {
    /// Client channel allocation flags
    ///
    /// The empty set requests a shared channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AllocFlags: u32 {
        /// Reserve the channel for this caller until it is freed
        const EXCLUSIVE = 1 << 0;
    }
}

bitflags! {
    /// Flags passed to a backend's channel allocator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelAllocFlags: u32 {
        /// Allocator may sleep waiting for memory
        const SLEEP = 1 << 0;
    }
}

bitflags! {
    /// Command allocation flags
    ///
    /// The empty set is a non-sleeping allocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CmdAllocFlags: u32 {
        /// Allocator may sleep waiting for a free descriptor
        const SLEEP = 1 << 0;
        /// Chain the new command after a previously allocated one
        const LINK = 1 << 1;
    }
}

bitflags! {
    /// Per-command submission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CmdFlags: u32 {
        /// Queue the descriptor without kicking the hardware
        const QUEUE = 1 << 0;
        /// Request an interrupt-driven completion (makes the command waitable)
        const INTR = 1 << 1;
        /// Backend hint: skip hardware statistics for this descriptor
        const NOSTAT = 1 << 2;
        /// Source buffer is not snooped
        const NOSRCSNOOP = 1 << 3;
        /// Destination buffer is not snooped
        const NODSTSNOOP = 1 << 4;
        /// Direct cache access hint is valid
        const DCA = 1 << 5;
    }
}

bitflags! {
    /// Poll flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollFlags: u32 {
        /// Block until the command completes
        const BLOCK = 1 << 0;
    }
}

bitflags! {
    /// Channel capability bits reported by a backend
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u64 {
        const COPY = 1 << 0;
        const DCA = 1 << 1;
        const NOSNOOP = 1 << 2;
        const MARKER = 1 << 3;
    }
}

/// Channel identity and capabilities, as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Stable identity value
    pub id: u64,
    pub capabilities: Capabilities,
    /// Descriptor entries actually provided
    pub queue_depth: u32,
    /// Channel number within its device
    pub channel_number: u32,
    /// Interconnect root the channel sits under, if known
    pub root: Option<NodeId>,
}

/// Device description supplied at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device tree node of the backend
    pub node: NodeId,
    /// Driver name, used to name published statistics
    pub driver: &'static str,
    /// Driver instance number
    pub instance: u32,
    /// Channels to materialize
    pub channel_count: usize,
}

/// Snapshot returned by [`Broker::query`](crate::Broker::query)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryInfo {
    pub version: u32,
    /// Members of the global pool
    pub channel_count: usize,
}

/// Copy operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyOp {
    /// Source physical address
    pub src: u64,
    /// Destination physical address
    pub dst: u64,
    /// Bytes to copy
    pub size: u64,
}

/// Direct cache access operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DcaOp {
    /// CPU whose cache should receive the data
    pub cpu: u32,
}

/// Operation a command requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CmdOp {
    #[default]
    Nop,
    Copy(CopyOp),
    Dca(DcaOp),
}

impl CmdOp {
    /// Bytes this operation moves
    pub const fn bytes(&self) -> u64 {
        match self {
            CmdOp::Copy(op) => op.size,
            CmdOp::Dca(_) | CmdOp::Nop => 0,
        }
    }
}

/// Outcome of a command poll that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdStatus {
    Complete,
    Pending,
}

impl CmdStatus {
    /// Classic integer code (`SUCCESS` or `PENDING`)
    pub const fn status_code(&self) -> i32 {
        match self {
            CmdStatus::Complete => status::SUCCESS,
            CmdStatus::Pending => status::PENDING,
        }
    }
}

/// Outcome of [`Broker::unregister`](crate::Broker::unregister)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnregisterStatus {
    /// Device torn down during the call
    Complete,
    /// Channels still referenced; completion is reported through
    /// [`DeviceBackend::unregister_complete`](crate::DeviceBackend::unregister_complete)
    Pending,
}

impl UnregisterStatus {
    /// Classic integer code (`SUCCESS` or `PENDING`)
    pub const fn status_code(&self) -> i32 {
        match self {
            UnregisterStatus::Complete => status::SUCCESS,
            UnregisterStatus::Pending => status::PENDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_copies_move_bytes() {
        let copy = CmdOp::Copy(CopyOp { src: 0x1000, dst: 0x2000, size: 4096 });
        assert_eq!(copy.bytes(), 4096);
        assert_eq!(CmdOp::Dca(DcaOp { cpu: 3 }).bytes(), 0);
        assert_eq!(CmdOp::default().bytes(), 0);
    }

    #[test]
    fn statuses_map_to_classic_codes() {
        assert_eq!(CmdStatus::Complete.status_code(), 0);
        assert_eq!(CmdStatus::Pending.status_code(), 1);
        assert_eq!(UnregisterStatus::Complete.status_code(), 0);
        assert_eq!(UnregisterStatus::Pending.status_code(), 1);
    }

    #[test]
    fn empty_alloc_flags_mean_shared() {
        assert!(!AllocFlags::default().contains(AllocFlags::EXCLUSIVE));
    }
}
