// src/broker/channel.rs

//! Per-channel state and the client's channel handle

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;

use super::command::Command;
use super::stats::{ChannelCounters, ChannelStats};
use super::ChannelId;
use crate::backend::{ChannelBackend, PlatformHooks};
use crate::constants::CHANNEL_STATS_PREFIX;
use crate::errors::Result;
use crate::list::List;
use crate::sync::{LockId, LockRegistry, OrderedMutex};
use crate::types::{ChannelInfo, CmdAllocFlags, DeviceInfo};

/// One channel, shared by the pool, its handles and its commands
pub(crate) struct Channel {
    id: ChannelId,
    info: ChannelInfo,
    name: String,
    backend: Box<dyn ChannelBackend>,
    /// Interrupt-driven commands awaiting completion, in post order
    poll_set: OrderedMutex<List<Command>>,
    counters: ChannelCounters,
    hooks: Arc<dyn PlatformHooks>,
    locks: Arc<LockRegistry>,
}

impl Channel {
    pub(super) fn new(
        id: ChannelId,
        info: ChannelInfo,
        device: &DeviceInfo,
        backend: Box<dyn ChannelBackend>,
        hooks: Arc<dyn PlatformHooks>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            id,
            info,
            name: format!(
                "{}:{}:{}{}",
                device.driver, device.instance, CHANNEL_STATS_PREFIX, info.channel_number
            ),
            backend,
            poll_set: OrderedMutex::new(LockId::PollSet, List::new(), locks.clone()),
            counters: ChannelCounters::default(),
            hooks,
            locks,
        }
    }

    #[inline]
    pub(super) fn id(&self) -> ChannelId {
        self.id
    }

    #[inline]
    pub(super) fn info(&self) -> &ChannelInfo {
        &self.info
    }

    /// Published statistics name, `<driver>:<instance>:channel<N>`
    #[inline]
    pub(super) fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(super) fn backend(&self) -> &dyn ChannelBackend {
        &*self.backend
    }

    #[inline]
    pub(super) fn hooks(&self) -> &dyn PlatformHooks {
        &*self.hooks
    }

    #[inline]
    pub(super) fn poll_set(&self) -> &OrderedMutex<List<Command>> {
        &self.poll_set
    }

    #[inline]
    pub(super) fn counters(&self) -> &ChannelCounters {
        &self.counters
    }

    #[inline]
    pub(super) fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    pub(super) fn stats(&self) -> ChannelStats {
        self.counters.snapshot(&self.name, &self.info)
    }

    /// Release everything the channel still holds
    ///
    /// Runs once, at device cleanup, with no broker lock held.
    pub(super) fn destroy(&self) {
        let abandoned = {
            let mut poll_set = self.poll_set.lock();
            let mut count = 0usize;
            while poll_set.pop_front().is_some() {
                count += 1;
            }
            count
        };
        if abandoned > 0 {
            log::warn!("{}: {} command(s) still tracked at teardown", self.name, abandoned);
        }
        self.backend.channel_free();
    }
}

impl core::fmt::Debug for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("info", &self.info)
            .finish()
    }
}

/// A client's claim on a channel
///
/// Obtained from [`Broker::allocate`](crate::Broker::allocate) and given back
/// with [`Broker::free`](crate::Broker::free). Dropping a handle without
/// freeing it leaks one reference and keeps the channel's device from ever
/// finishing a deferred unregister.
#[must_use = "channels must be released with Broker::free"]
pub struct ChannelHandle {
    id: ChannelId,
    channel: Arc<Channel>,
}

impl ChannelHandle {
    pub(super) fn new(id: ChannelId, channel: Arc<Channel>) -> Self {
        Self { id, channel }
    }

    #[inline]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub(super) fn name(&self) -> &str {
        self.channel.name()
    }

    /// Identity and capabilities of the channel
    pub fn query(&self) -> ChannelInfo {
        self.channel.info
    }

    pub fn stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    /// Allocate a command bound to this channel
    ///
    /// With [`CmdAllocFlags::LINK`], `link` must be a command of this same
    /// channel; the backend chains the new command after it.
    pub fn cmd_alloc(&self, flags: CmdAllocFlags, link: Option<&Command>) -> Result<Command> {
        Command::alloc(&self.channel, flags, link)
    }
}

impl core::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .field("name", &self.channel.name)
            .finish()
    }
}
