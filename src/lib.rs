// src/lib.rs
//! DMA copy-offload channel broker
//!
//! Lets unrelated kernel subsystems share the copy channels exposed by one
//! or more DMA engines. Hardware backends register devices and their
//! channels; clients allocate channels (shared round-robin, or exclusively
//! reserved), submit asynchronous commands against them and poll or block
//! for completion. Devices may unregister at any time; teardown is deferred
//! until every outstanding allocation on their channels has been released.
//!
//! # Example
//!
//! ```no_run
//! # use dma_broker::*;
//! # fn demo(broker: &Broker) -> Result<()> {
//! let channel = broker.allocate(AllocFlags::empty(), None)?;
//! let cmd = channel.cmd_alloc(CmdAllocFlags::SLEEP, None)?;
//! cmd.set_op(CmdOp::Copy(CopyOp { src: 0x1000, dst: 0x2000, size: 4096 }));
//! cmd.set_flags(CmdFlags::INTR);
//! cmd.post()?;
//! cmd.poll(PollFlags::BLOCK)?;
//! cmd.free();
//! broker.free(channel);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arena;
pub mod backend;
pub mod broker;
pub mod config;
pub mod constants;
pub mod errors;
pub mod list;
pub mod sync;
pub mod topology;
pub mod types;

pub use backend::{ChannelBackend, CommandPrivate, DeviceBackend, NoopHooks, PlatformHooks};
pub use broker::{
    Broker, ChannelHandle, ChannelId, ChannelStats, Command, Descriptor, DeviceHandle,
};
pub use config::BrokerConfig;
pub use errors::{BrokerError, ErrorContext, FailureKind, Result};
pub use topology::NodeTree;
pub use types::{
    AllocFlags, Capabilities, ChannelAllocFlags, ChannelInfo, CmdAllocFlags, CmdFlags, CmdOp,
    CmdStatus, CopyOp, DcaOp, DeviceInfo, NodeId, PollFlags, QueryInfo, UnregisterStatus,
};
