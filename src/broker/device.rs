// src/broker/device.rs

//! Device registry and teardown
//!
//! # Unregister
//!
//! ```text
//!  unregister ──► every channel idle ──► cleanup now ──► Complete
//!       │
//!       └──────► some channel held ──► mark removing, drain += 1 ──► Pending
//!                                             │
//!                     last Broker::free ──────┴──► drain == 0 ──► cleanup
//!                                                                 └► unregister_complete
//! ```
//!
//! Lock order on every path is pool, then the device's channel list, then
//! the device list.

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::channel::Channel;
use super::pool::{ChannelSlot, Pool};
use super::{Broker, ChannelId};
use crate::backend::DeviceBackend;
use crate::errors::{FailureKind, Result};
use crate::list::{List, ListKey};
use crate::sync::{LockId, OrderedGuard, OrderedMutex};
use crate::types::{DeviceInfo, UnregisterStatus};

/// Lifecycle bookkeeping of one device, guarded by its own lock
pub(super) struct DeviceChannels {
    channels: List<ChannelId>,
    /// Channels marked removing that still have outstanding allocations
    pub(super) draining: usize,
    /// Position in the broker's device list
    registry_key: Option<ListKey>,
    /// Cleanup has run
    gone: bool,
}

pub(crate) struct Device {
    backend: Arc<dyn DeviceBackend>,
    info: DeviceInfo,
    pub(super) state: OrderedMutex<DeviceChannels>,
}

impl core::fmt::Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("info", &self.info)
            .field("state", &self.state)
            .finish()
    }
}

/// Registration returned to the backend
///
/// Pass it to [`Broker::unregister`]; a pending unregister may be retried
/// with the same handle.
pub struct DeviceHandle {
    device: Arc<Device>,
}

impl DeviceHandle {
    pub fn info(&self) -> &DeviceInfo {
        &self.device.info
    }
}

impl core::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("info", &self.device.info)
            .finish()
    }
}

impl Broker {
    /// Register a device and put its channels into the pool
    ///
    /// The backend materializes `info.channel_count` channels. If any of
    /// them fails, the ones already built are released in reverse order and
    /// the device never becomes visible.
    pub fn register(
        &self,
        backend: Arc<dyn DeviceBackend>,
        info: DeviceInfo,
    ) -> Result<DeviceHandle> {
        let ids: Vec<ChannelId> = {
            let mut pool = self.pool.lock();
            (0..info.channel_count).map(|_| pool.reserve()).collect()
        };

        let mut built: Vec<Arc<Channel>> = Vec::with_capacity(ids.len());
        for &id in &ids {
            let requested =
                backend.channel_alloc(id, self.config.channel_alloc_flags, self.config.queue_depth);
            match requested {
                Ok((channel_info, channel_backend)) => built.push(Arc::new(Channel::new(
                    id,
                    channel_info,
                    &info,
                    channel_backend,
                    self.hooks.clone(),
                    self.locks.clone(),
                ))),
                Err(e) => {
                    log::warn!(
                        "{}:{}: channel {} of {} failed to allocate: {}",
                        info.driver,
                        info.instance,
                        built.len(),
                        info.channel_count,
                        e
                    );
                    for channel in built.iter().rev() {
                        channel.backend().channel_free();
                    }
                    let mut pool = self.pool.lock();
                    for &id in &ids {
                        pool.release(id);
                    }
                    return Err(e);
                }
            }
        }

        let device = Arc::new(Device {
            backend,
            info,
            state: OrderedMutex::new(
                LockId::DeviceChannels,
                DeviceChannels {
                    channels: List::new(),
                    draining: 0,
                    registry_key: None,
                    gone: false,
                },
                self.locks.clone(),
            ),
        });

        {
            let mut pool = self.pool.lock();
            let mut state = device.state.lock_nested(&pool);
            for channel in built {
                let id = channel.id();
                if !pool.fill(id, ChannelSlot::new(channel, device.clone())) {
                    log::warn!("channel id {:?} lost its reservation", id);
                    continue;
                }
                state.channels.push_back(id);
            }
            {
                let mut devices = self.devices.lock_nested(&state);
                state.registry_key = Some(devices.push_back(device.clone()));
            }
            for id in state.channels.iter() {
                pool.link(*id);
            }
            self.sync_offload(&mut pool);
        }

        log::info!(
            "registered {}:{} with {} channel(s)",
            info.driver,
            info.instance,
            info.channel_count
        );
        Ok(DeviceHandle { device })
    }

    /// Withdraw a device's channels from the pool
    ///
    /// Returns [`UnregisterStatus::Complete`] when the device was torn down
    /// in this call. [`UnregisterStatus::Pending`] means some channels are
    /// still held; teardown finishes on their last [`Broker::free`] and the
    /// backend hears about it through
    /// [`DeviceBackend::unregister_complete`].
    pub fn unregister(&self, handle: &DeviceHandle) -> Result<UnregisterStatus> {
        let device = &handle.device;
        let mut pool = self.pool.lock();
        let mut state = device.state.lock_nested(&pool);

        if state.gone {
            return Err(FailureKind::DeviceGone.into());
        }

        let ids: Vec<ChannelId> = state.channels.iter().copied().collect();
        let mut busy = false;
        for id in ids {
            let Some(slot) = pool.slot_mut(id) else {
                continue;
            };
            if slot.removing {
                busy = true;
                continue;
            }
            if slot.ref_count != 0 {
                slot.removing = true;
                state.draining += 1;
                busy = true;
            }
            let unlink = slot.is_linked() && !slot.exclusive;
            if unlink {
                pool.unlink(id);
            }
        }
        self.sync_offload(&mut pool);

        if busy {
            log::debug!(
                "{}:{}: unregister pending, {} channel(s) draining",
                device.info.driver,
                device.info.instance,
                state.draining
            );
            return Ok(UnregisterStatus::Pending);
        }

        let channels = self.detach(&mut pool, &mut state);
        drop(state);
        drop(pool);
        self.finish_cleanup(device, channels, false);
        Ok(UnregisterStatus::Complete)
    }

    /// Remove every channel record of a drained device and take the device
    /// out of the registry
    ///
    /// The returned channels are destroyed by [`Broker::finish_cleanup`]
    /// once the locks are dropped.
    pub(super) fn detach(
        &self,
        pool: &mut OrderedGuard<'_, Pool>,
        state: &mut OrderedGuard<'_, DeviceChannels>,
    ) -> Vec<Arc<Channel>> {
        let mut channels = Vec::with_capacity(state.channels.len());
        while let Some(id) = state.channels.pop_front() {
            if let Some(slot) = pool.remove(id) {
                channels.push(slot.channel);
            }
        }

        let key = state.registry_key.take();
        {
            let mut devices = self.devices.lock_nested(state);
            if let Some(key) = key {
                devices.remove(key);
            }
        }
        state.gone = true;
        channels
    }

    /// Destroy detached channels and report a deferred unregister
    pub(super) fn finish_cleanup(
        &self,
        device: &Device,
        channels: Vec<Arc<Channel>>,
        deferred: bool,
    ) {
        for channel in &channels {
            channel.destroy();
        }
        drop(channels);

        if deferred {
            device.backend.unregister_complete(Ok(()));
        }

        {
            let mut pool = self.pool.lock();
            self.sync_offload(&mut pool);
        }

        log::info!(
            "unregistered {}:{}{}",
            device.info.driver,
            device.info.instance,
            if deferred { " (deferred)" } else { "" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{rig, Script, ScriptDevice};
    use crate::types::{AllocFlags, DeviceInfo, NodeId, UnregisterStatus};
    use crate::{BrokerError, FailureKind};
    use alloc::sync::Arc;

    #[test]
    fn register_failure_unwinds_in_reverse() {
        let script = Script::new();
        script.fail_channel_alloc_at(2);
        let broker = crate::Broker::with_defaults();
        let result = broker.register(
            Arc::new(ScriptDevice::new(script.clone())),
            DeviceInfo {
                node: NodeId(1),
                driver: "mock",
                instance: 0,
                channel_count: 4,
            },
        );
        assert_eq!(result.err(), Some(BrokerError::REJECTED));
        assert_eq!(script.freed_channels(), alloc::vec![1, 0]);
        assert_eq!(broker.query().channel_count, 0);
        assert_eq!(broker.device_count(), 0);
        assert!(broker.all_channel_stats().is_empty());
    }

    #[test]
    fn idle_unregister_completes_synchronously() {
        let (broker, dev, script) = rig(2);
        assert_eq!(broker.unregister(&dev), Ok(UnregisterStatus::Complete));
        assert_eq!(broker.device_count(), 0);
        assert_eq!(script.freed_channels().len(), 2);
        assert_eq!(script.unregister_completions(), 0);
        assert_eq!(
            broker.unregister(&dev),
            Err(BrokerError::Failure(FailureKind::DeviceGone))
        );
    }

    #[test]
    fn repeated_pending_unregister_does_not_double_count() {
        let (broker, dev, script) = rig(1);
        let handle = broker.allocate(AllocFlags::empty(), None).unwrap();

        assert_eq!(broker.unregister(&dev), Ok(UnregisterStatus::Pending));
        assert_eq!(broker.unregister(&dev), Ok(UnregisterStatus::Pending));
        assert_eq!(script.unregister_completions(), 0);

        broker.free(handle);
        assert_eq!(script.unregister_completions(), 1);
        assert_eq!(broker.device_count(), 0);
    }
}
