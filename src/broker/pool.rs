// src/broker/pool.rs

//! Global channel pool
//!
//! Every registered channel has a record in the pool's arena for as long as
//! its device is registered. Membership in the round-robin list is separate:
//! a channel leaves the list while held exclusively and once its device
//! starts unregistering.
//!
//! The cursor names the list member the next shared allocation starts its
//! scan from. It is only ever moved under the pool lock, and any unlink that
//! would leave it dangling advances it first.

use alloc::sync::Arc;

use super::channel::{Channel, ChannelHandle};
use super::device::Device;
use super::{Broker, ChannelId};
use crate::arena::Arena;
use crate::errors::{BrokerError, Result};
use crate::list::{List, ListKey};
use crate::types::{AllocFlags, NodeId};

/// Pool bookkeeping for one channel
pub(super) struct ChannelSlot {
    pub(super) channel: Arc<Channel>,
    pub(super) device: Arc<Device>,
    /// Outstanding allocations
    pub(super) ref_count: u64,
    pub(super) exclusive: bool,
    /// Device is unregistering and waits for this channel to drain
    pub(super) removing: bool,
    /// Position in the round-robin list, if linked
    member: Option<ListKey>,
}

impl ChannelSlot {
    pub(super) fn new(channel: Arc<Channel>, device: Arc<Device>) -> Self {
        Self {
            channel,
            device,
            ref_count: 0,
            exclusive: false,
            removing: false,
            member: None,
        }
    }

    #[inline]
    pub(super) fn is_linked(&self) -> bool {
        self.member.is_some()
    }
}

pub(super) struct Pool {
    slots: Arena<ChannelSlot>,
    members: List<ChannelId>,
    cursor: Option<ListKey>,
    offload: bool,
}

impl Pool {
    pub(super) const fn new() -> Self {
        Self {
            slots: Arena::new(),
            members: List::new(),
            cursor: None,
            offload: false,
        }
    }

    #[inline]
    pub(super) fn member_count(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub(super) fn offload_enabled(&self) -> bool {
        self.offload
    }

    #[inline]
    pub(super) fn set_offload(&mut self, enabled: bool) {
        self.offload = enabled;
    }

    /// Every registered channel, linked or not
    pub(super) fn channels(&self) -> impl Iterator<Item = &Arc<Channel>> {
        self.slots.iter().map(|(_, slot)| &slot.channel)
    }

    /// Issue an id for a channel that is still being built
    pub(super) fn reserve(&mut self) -> ChannelId {
        ChannelId(self.slots.reserve())
    }

    /// Return an id whose channel was never built
    pub(super) fn release(&mut self, id: ChannelId) {
        self.slots.release(id.0);
    }

    /// Store the record for a reserved id
    pub(super) fn fill(&mut self, id: ChannelId, slot: ChannelSlot) -> bool {
        self.slots.fill(id.0, slot).is_ok()
    }

    pub(super) fn slot(&self, id: ChannelId) -> Option<&ChannelSlot> {
        self.slots.get(id.0)
    }

    pub(super) fn slot_mut(&mut self, id: ChannelId) -> Option<&mut ChannelSlot> {
        self.slots.get_mut(id.0)
    }

    /// Drop the record of `id`, unlinking it first
    pub(super) fn remove(&mut self, id: ChannelId) -> Option<ChannelSlot> {
        self.unlink(id);
        self.slots.remove(id.0)
    }

    /// Append `id` at the tail of the round-robin list
    ///
    /// The cursor is left alone unless the list was empty.
    pub(super) fn link(&mut self, id: ChannelId) {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return;
        };
        if slot.member.is_some() {
            return;
        }
        let key = self.members.push_back(id);
        slot.member = Some(key);
        if self.cursor.is_none() {
            self.cursor = Some(key);
        }
    }

    /// Take `id` out of the round-robin list if it is linked
    pub(super) fn unlink(&mut self, id: ChannelId) {
        let Some(key) = self.slots.get_mut(id.0).and_then(|slot| slot.member.take()) else {
            return;
        };
        if self.cursor == Some(key) {
            self.cursor = self.members.next_circular(key).filter(|next| *next != key);
        }
        self.members.remove(key);
        if self.members.is_empty() {
            self.cursor = None;
        }
    }

    /// Pick the next eligible member, scanning one full circuit from the
    /// cursor, and move the cursor past it
    fn select(&mut self, exclusive: bool, node_filter: Option<NodeId>) -> Option<ChannelId> {
        let mut key = self.cursor?;
        for _ in 0..self.members.len() {
            let id = *self.members.get(key)?;
            let next = self.members.next_circular(key)?;
            let eligible = self.slots.get(id.0).is_some_and(|slot| {
                node_filter.is_none_or(|root| slot.channel.info().root == Some(root))
                    && (!exclusive || slot.ref_count == 0)
            });
            if eligible {
                self.cursor = Some(next);
                return Some(id);
            }
            key = next;
        }
        None
    }
}

impl core::fmt::Debug for Pool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("channels", &self.slots.len())
            .field("members", &self.members.len())
            .field("offload", &self.offload)
            .finish()
    }
}

impl Broker {
    /// Acquire a channel
    ///
    /// A shared request takes the next eligible channel in round-robin
    /// order. An exclusive request additionally needs a channel nobody holds
    /// and is refused outright when the pool has one member or fewer, so a
    /// shared channel always remains.
    pub fn allocate(
        &self,
        flags: AllocFlags,
        node_filter: Option<NodeId>,
    ) -> Result<ChannelHandle> {
        let exclusive = flags.contains(AllocFlags::EXCLUSIVE);
        let mut pool = self.pool.lock();

        let members = pool.member_count();
        if members == 0 || (exclusive && members <= 1) {
            return Err(BrokerError::NoResources);
        }

        let id = pool.select(exclusive, node_filter).ok_or(BrokerError::NoResources)?;
        let channel = {
            let slot = pool.slot_mut(id).ok_or(BrokerError::NoResources)?;
            slot.ref_count += 1;
            slot.exclusive |= exclusive;
            slot.channel.clone()
        };
        if exclusive {
            pool.unlink(id);
        }

        log::trace!(
            "allocated {} ({})",
            channel.name(),
            if exclusive { "exclusive" } else { "shared" }
        );
        Ok(ChannelHandle::new(id, channel))
    }

    /// Release a channel
    ///
    /// An exclusive channel goes back to the tail of the pool unless its
    /// device is unregistering. The last release of a draining channel may
    /// finish its device's deferred unregister.
    pub fn free(&self, handle: ChannelHandle) {
        let id = handle.id();
        let mut pool = self.pool.lock();

        let (remaining, was_exclusive, removing, device) = match pool.slot_mut(id) {
            Some(slot) => {
                if slot.ref_count == 0 {
                    log::warn!("free of {} with no outstanding allocation", slot.channel.name());
                }
                slot.ref_count = slot.ref_count.saturating_sub(1);
                let was_exclusive = core::mem::replace(&mut slot.exclusive, false);
                (slot.ref_count, was_exclusive, slot.removing, slot.device.clone())
            }
            None => {
                log::warn!("free of unknown channel {:?}", id);
                return;
            }
        };

        if was_exclusive && !removing {
            pool.link(id);
            self.sync_offload(&mut pool);
        }
        log::trace!("freed {} ({} outstanding)", handle.name(), remaining);
        drop(handle);

        if !(removing && remaining == 0) {
            return;
        }

        let channels = {
            let mut state = device.state.lock_nested(&pool);
            state.draining = state.draining.saturating_sub(1);
            if state.draining > 0 {
                return;
            }
            self.detach(&mut pool, &mut state)
        };
        drop(pool);

        self.finish_cleanup(&device, channels, true);
    }
}
