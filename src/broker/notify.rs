// src/broker/notify.rs

//! Completion notifier
//!
//! A channel retires commands strictly in post order, so the poll set is
//! walked from the head and the walk stops at the first command the backend
//! still reports pending: nothing behind it can have finished either.

use super::channel::Channel;
use super::{Broker, ChannelId};
use crate::errors::{FailureKind, Result};
use crate::types::CmdStatus;

impl Broker {
    /// Backend entry point: the hardware posted completions on `id`
    ///
    /// Returns the number of tracked commands retired by this pass.
    pub fn channel_notify(&self, id: ChannelId) -> Result<usize> {
        let channel = {
            let pool = self.pool.lock();
            pool.slot(id)
                .map(|slot| slot.channel.clone())
                .ok_or(FailureKind::ChannelGone)?
        };
        Ok(channel.notify())
    }
}

impl Channel {
    pub(super) fn notify(&self) -> usize {
        let counters = self.counters();
        let mut poll_set = self.poll_set().lock();
        let mut retired = 0;

        while let Some(key) = poll_set.front() {
            counters.notify_poll.inc();

            let status = {
                let Some(cmd) = poll_set.get(key) else {
                    break;
                };
                let mut control = cmd.control_nested(&poll_set);
                let status = self.backend().cmd_poll(cmd);
                if let Ok(CmdStatus::Pending) = status {
                    counters.notify_pending.inc();
                    break;
                }
                control.resolve(status.map(|_| ()));
                status
            };

            poll_set.remove(key);
            retired += 1;
            log::trace!("{}: retired command ({:?})", self.name(), status);
        }

        retired
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::rig;
    use crate::types::{CmdFlags, PollFlags};
    use crate::{AllocFlags, BrokerError, CmdAllocFlags, FailureKind};
    use alloc::vec::Vec;

    #[test]
    fn notifier_stops_at_first_pending() {
        let (broker, _dev, script) = rig(1);
        let handle = broker.allocate(AllocFlags::empty(), None).unwrap();

        let cmds: Vec<_> = (0..3)
            .map(|_| {
                let cmd = handle.cmd_alloc(CmdAllocFlags::empty(), None).unwrap();
                cmd.set_flags(CmdFlags::INTR);
                cmd.post().unwrap();
                cmd
            })
            .collect();
        assert!(cmds.iter().all(|c| c.is_tracked()));

        script.complete(2);
        assert_eq!(broker.channel_notify(handle.id()).unwrap(), 2);
        assert!(!cmds[0].is_tracked());
        assert!(!cmds[1].is_tracked());
        assert!(cmds[2].is_tracked());
        assert_eq!(cmds[0].result(), Ok(()));
        assert_eq!(
            cmds[2].result(),
            Err(BrokerError::Failure(FailureKind::Unresolved))
        );

        let stats = handle.stats();
        assert_eq!(stats.notify_poll, 3);
        assert_eq!(stats.notify_pending, 1);

        for cmd in cmds {
            cmd.free();
        }
        broker.free(handle);
    }

    #[test]
    fn hardware_error_retires_command() {
        let (broker, _dev, script) = rig(1);
        let handle = broker.allocate(AllocFlags::empty(), None).unwrap();
        let cmd = handle.cmd_alloc(CmdAllocFlags::empty(), None).unwrap();
        cmd.set_flags(CmdFlags::INTR);
        cmd.post().unwrap();

        script.fail_next();
        assert_eq!(broker.channel_notify(handle.id()).unwrap(), 1);
        assert_eq!(cmd.result(), Err(BrokerError::HARDWARE));
        assert_eq!(cmd.poll(PollFlags::empty()), Err(BrokerError::HARDWARE));
        assert!(!cmd.is_tracked());

        cmd.free();
        broker.free(handle);
    }

    #[test]
    fn notify_on_unknown_channel() {
        let (broker, dev, _script) = rig(1);
        let handle = broker.allocate(AllocFlags::empty(), None).unwrap();
        let id = handle.id();
        broker.free(handle);
        broker.unregister(&dev).unwrap();
        assert_eq!(
            broker.channel_notify(id),
            Err(BrokerError::Failure(FailureKind::ChannelGone))
        );
    }
}
