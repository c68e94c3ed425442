// src/broker/testing.rs

//! Scripted backend for the broker's unit tests
//!
//! Commands get a sequence number at allocation and the script completes
//! them strictly in that order.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use super::{Broker, ChannelId, Command, DeviceHandle};
use crate::backend::{ChannelBackend, CommandPrivate, DeviceBackend};
use crate::errors::{BrokerError, Result};
use crate::types::{
    Capabilities, ChannelAllocFlags, ChannelInfo, CmdAllocFlags, CmdStatus, DeviceInfo, NodeId,
};

#[derive(Default)]
struct ScriptState {
    next_seq: u64,
    completed: u64,
    failed: Vec<u64>,
    fail_channel_at: Option<usize>,
    channels_built: usize,
    freed_channels: Vec<u32>,
    unregister_completions: usize,
}

#[derive(Default)]
pub(crate) struct Script {
    state: Mutex<ScriptState>,
}

impl Script {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_channel_alloc_at(&self, index: usize) {
        self.state.lock().fail_channel_at = Some(index);
    }

    /// Retire the next `n` commands successfully
    pub(crate) fn complete(&self, n: u64) {
        self.state.lock().completed += n;
    }

    /// Retire the next command with a hardware error
    pub(crate) fn fail_next(&self) {
        let mut state = self.state.lock();
        let seq = state.completed;
        state.failed.push(seq);
        state.completed += 1;
    }

    pub(crate) fn freed_channels(&self) -> Vec<u32> {
        self.state.lock().freed_channels.clone()
    }

    pub(crate) fn unregister_completions(&self) -> usize {
        self.state.lock().unregister_completions
    }
}

pub(crate) struct ScriptDevice {
    script: Arc<Script>,
}

impl ScriptDevice {
    pub(crate) fn new(script: Arc<Script>) -> Self {
        Self { script }
    }
}

impl DeviceBackend for ScriptDevice {
    fn channel_alloc(
        &self,
        _channel: ChannelId,
        _flags: ChannelAllocFlags,
        queue_depth: u32,
    ) -> Result<(ChannelInfo, Box<dyn ChannelBackend>)> {
        let mut state = self.script.state.lock();
        let number = state.channels_built;
        if state.fail_channel_at == Some(number) {
            return Err(BrokerError::REJECTED);
        }
        state.channels_built += 1;
        let info = ChannelInfo {
            id: 0x100 + number as u64,
            capabilities: Capabilities::COPY,
            queue_depth,
            channel_number: number as u32,
            root: None,
        };
        let channel = ScriptChannel {
            script: self.script.clone(),
            number: number as u32,
        };
        Ok((info, Box::new(channel)))
    }

    fn unregister_complete(&self, status: Result<()>) {
        assert_eq!(status, Ok(()));
        self.script.state.lock().unregister_completions += 1;
    }
}

struct Seq(u64);

struct ScriptChannel {
    script: Arc<Script>,
    number: u32,
}

impl ChannelBackend for ScriptChannel {
    fn cmd_alloc(&self, _flags: CmdAllocFlags, _link: Option<&Command>) -> Result<CommandPrivate> {
        let mut state = self.script.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        Ok(Box::new(Seq(seq)))
    }

    fn cmd_post(&self, cmd: &Command) -> Result<()> {
        cmd.posted();
        Ok(())
    }

    fn cmd_poll(&self, cmd: &Command) -> Result<CmdStatus> {
        let seq = cmd.private::<Seq>().map_or(u64::MAX, |s| s.0);
        let state = self.script.state.lock();
        if seq >= state.completed {
            Ok(CmdStatus::Pending)
        } else if state.failed.contains(&seq) {
            Err(BrokerError::HARDWARE)
        } else {
            Ok(CmdStatus::Complete)
        }
    }

    fn channel_free(&self) {
        self.script.state.lock().freed_channels.push(self.number);
    }
}

/// Register another scripted device on `broker`
pub(crate) fn attach(
    broker: &Broker,
    channels: usize,
    instance: u32,
) -> (DeviceHandle, Arc<Script>) {
    let script = Script::new();
    let device = broker
        .register(
            Arc::new(ScriptDevice::new(script.clone())),
            DeviceInfo {
                node: NodeId(u64::from(instance) + 1),
                driver: "mock",
                instance,
                channel_count: channels,
            },
        )
        .unwrap();
    (device, script)
}

/// A broker with one registered scripted device of `channels` channels
pub(crate) fn rig(channels: usize) -> (Broker, DeviceHandle, Arc<Script>) {
    let broker = Broker::with_defaults();
    let (device, script) = attach(&broker, channels, 0);
    (broker, device, script)
}
