// src/broker/mod.rs

//! DMA copy-offload channel broker
//!
//! The [`Broker`] owns every piece of shared state: the registered devices,
//! the global channel pool with its round-robin cursor, and the lock
//! registry. Backends register devices and report completions through it;
//! clients allocate channels from it and drive commands through the
//! resulting [`ChannelHandle`].
//!
//! # Layout
//!
//! - `pool`: channel records, pool membership, allocate/free
//! - `device`: register, unregister, deferred cleanup
//! - `channel`: per-channel state and client handle
//! - `command`: command lifecycle and blocking poll
//! - `notify`: completion notifier
//! - `stats`: per-channel counters

mod channel;
mod command;
mod device;
mod notify;
mod pool;
mod stats;
#[cfg(test)]
mod testing;

pub use channel::ChannelHandle;
pub use command::{Command, Descriptor};
pub use device::DeviceHandle;
pub use stats::ChannelStats;

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::arena::Key;
use crate::backend::{NoopHooks, PlatformHooks};
use crate::config::BrokerConfig;
use crate::constants::QUERY_VERSION;
use crate::list::List;
use crate::sync::{LockId, LockRegistry, LockStats, OrderedMutex};
use crate::topology::{self, NodeTree};
use crate::types::{NodeId, QueryInfo};

use device::Device;
use pool::Pool;

/// Identity of one registered channel
///
/// Issued to the backend at channel allocation; the backend hands it back
/// to [`Broker::channel_notify`]. A stale id never aliases a later channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(Key);

/// Channel broker context
pub struct Broker {
    config: BrokerConfig,
    hooks: Arc<dyn PlatformHooks>,
    locks: Arc<LockRegistry>,
    pool: OrderedMutex<Pool>,
    devices: OrderedMutex<List<Arc<Device>>>,
}

impl Broker {
    pub fn new(config: BrokerConfig, hooks: Arc<dyn PlatformHooks>) -> Self {
        let locks = LockRegistry::new();
        Self {
            config,
            hooks,
            pool: OrderedMutex::new(LockId::Pool, Pool::new(), locks.clone()),
            devices: OrderedMutex::new(LockId::DeviceList, List::new(), locks.clone()),
            locks,
        }
    }

    /// Broker with default configuration and no platform hooks
    pub fn with_defaults() -> Self {
        Self::new(BrokerConfig::default(), Arc::new(NoopHooks))
    }

    /// Size of the global pool
    pub fn query(&self) -> QueryInfo {
        let pool = self.pool.lock();
        QueryInfo {
            version: QUERY_VERSION,
            channel_count: pool.member_count(),
        }
    }

    /// Registered devices, including those with a pending unregister
    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Whether the accelerated-copy signal is currently raised
    pub fn offload_enabled(&self) -> bool {
        self.pool.lock().offload_enabled()
    }

    /// Per-level lock statistics, in acquisition order
    pub fn lock_stats(&self) -> [LockStats; LockId::COUNT] {
        self.locks.all()
    }

    /// Outstanding allocations of a registered channel
    pub fn channel_ref_count(&self, id: ChannelId) -> Option<u64> {
        self.pool.lock().slot(id).map(|slot| slot.ref_count)
    }

    /// Statistics of every registered channel
    pub fn all_channel_stats(&self) -> Vec<ChannelStats> {
        let pool = self.pool.lock();
        pool.channels().map(|channel| channel.stats()).collect()
    }

    /// Interconnect root above `node`, for use as an allocation filter
    pub fn root_complex<T: NodeTree + ?Sized>(&self, tree: &T, node: NodeId) -> Option<NodeId> {
        topology::root_complex(tree, node, self.config.root_complex_compatible)
    }

    /// Raise or clear the accelerated-copy signal to match the pool
    ///
    /// Hooks fire only on transitions.
    fn sync_offload(&self, pool: &mut Pool) {
        let available = pool.member_count() > 0;
        if available == pool.offload_enabled() {
            return;
        }
        pool.set_offload(available);
        if available {
            log::debug!("copy offload enabled");
            self.hooks.copy_offload_enable();
        } else {
            log::debug!("copy offload disabled");
            self.hooks.copy_offload_disable();
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        let devices = self.devices.lock().len();
        if devices > 0 {
            log::warn!("broker dropped with {} device(s) still registered", devices);
        }
    }
}

impl core::fmt::Debug for Broker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Broker")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("devices", &self.devices)
            .finish()
    }
}
