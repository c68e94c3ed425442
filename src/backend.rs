// src/backend.rs

//! Backend and platform interfaces
//!
//! Each hardware driver implements [`DeviceBackend`] for the device as a
//! whole and hands back one [`ChannelBackend`] per channel it materializes.
//! The broker never touches hardware itself; every data-path decision is
//! delegated through these traits.
//!
//! # Call context
//!
//! - `cmd_poll` runs with the command's control block locked (and, from the
//!   completion notifier, with the channel's poll set locked too). It must
//!   not call back into [`Command::posted`] or the broker.
//! - `cmd_post` runs with no broker lock held. A backend that accepts an
//!   interrupt-driven command calls [`Command::posted`] after queueing the
//!   descriptor and before kicking the hardware.
//! - The offload hooks of [`PlatformHooks`] are invoked with the pool lock
//!   held and must not call back into the broker.
//! - [`PlatformHooks::relax`] runs on a thread blocked in
//!   [`Command::poll`] with no broker lock held.

use alloc::boxed::Box;
use core::any::Any;

use crate::broker::{ChannelId, Command};
use crate::errors::Result;
use crate::types::{ChannelAllocFlags, ChannelInfo, CmdAllocFlags, CmdStatus};

/// Backend-private state attached to a command at allocation
pub type CommandPrivate = Box<dyn Any + Send + Sync>;

/// Device-level callbacks
pub trait DeviceBackend: Send + Sync {
    /// Materialize one channel
    ///
    /// `channel` is the identity the backend passes to
    /// [`Broker::channel_notify`](crate::Broker::channel_notify) when the
    /// channel posts completions.
    fn channel_alloc(
        &self,
        channel: ChannelId,
        flags: ChannelAllocFlags,
        queue_depth: u32,
    ) -> Result<(ChannelInfo, Box<dyn ChannelBackend>)>;

    /// Called exactly once per deferred unregistration, after every channel
    /// of the device has drained
    fn unregister_complete(&self, status: Result<()>);
}

/// Channel-level callbacks
pub trait ChannelBackend: Send + Sync {
    /// Build the private state of a new command
    ///
    /// `link` is the previous command when `flags` contains `LINK`.
    fn cmd_alloc(&self, flags: CmdAllocFlags, link: Option<&Command>) -> Result<CommandPrivate>;

    /// Release whatever the backend holds for `cmd`
    fn cmd_free(&self, _cmd: &Command) {}

    /// Submit `cmd` to the hardware queue
    fn cmd_post(&self, cmd: &Command) -> Result<()>;

    /// Report the current status of `cmd`
    fn cmd_poll(&self, cmd: &Command) -> Result<CmdStatus>;

    /// Release the channel's private state; called once, at device cleanup
    fn channel_free(&self) {}
}

/// Platform collaborator told whether accelerated copy is available
pub trait PlatformHooks: Send + Sync {
    /// First channel became available
    fn copy_offload_enable(&self) {}

    /// Last channel left the pool
    fn copy_offload_disable(&self) {}

    /// Give up the CPU while a blocking poll waits for its notifier
    ///
    /// Called repeatedly until the command completes, so it may yield or
    /// park briefly but must return. The default only hints the CPU.
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PlatformHooks for NoopHooks {}
