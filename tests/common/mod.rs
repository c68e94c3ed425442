//! Scripted mock backend shared by the integration tests
//!
//! Each channel numbers its commands at allocation and "hardware" retires
//! them strictly in that order when a test calls `complete`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dma_broker::{
    Broker, BrokerConfig, BrokerError, Capabilities, ChannelAllocFlags, ChannelBackend, ChannelId,
    ChannelInfo, CmdAllocFlags, CmdStatus, Command, CommandPrivate, DeviceBackend, DeviceHandle,
    DeviceInfo, NodeId, PlatformHooks, Result,
};

/// Hardware view of one channel
#[derive(Debug)]
pub struct MockChannel {
    pub id: ChannelId,
    pub number: u32,
    next_seq: AtomicU64,
    completed: AtomicU64,
    failed: Mutex<Vec<u64>>,
    reject_posts: AtomicBool,
    pub freed_cmds: AtomicUsize,
}

impl MockChannel {
    /// Retire the next `n` commands successfully
    pub fn complete(&self, n: u64) {
        self.completed.fetch_add(n, Ordering::SeqCst);
    }

    /// Retire the next command with a hardware error
    pub fn fail_next(&self) {
        let seq = self.completed.fetch_add(1, Ordering::SeqCst);
        self.failed.lock().unwrap().push(seq);
    }

    pub fn reject_posts(&self, reject: bool) {
        self.reject_posts.store(reject, Ordering::SeqCst);
    }
}

struct Seq(u64);

struct MockChannelBackend {
    hw: Arc<MockChannel>,
    freed: Arc<Mutex<Vec<u32>>>,
}

impl ChannelBackend for MockChannelBackend {
    fn cmd_alloc(&self, _flags: CmdAllocFlags, _link: Option<&Command>) -> Result<CommandPrivate> {
        let seq = self.hw.next_seq.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Seq(seq)))
    }

    fn cmd_free(&self, _cmd: &Command) {
        self.hw.freed_cmds.fetch_add(1, Ordering::SeqCst);
    }

    fn cmd_post(&self, cmd: &Command) -> Result<()> {
        if self.hw.reject_posts.load(Ordering::SeqCst) {
            return Err(BrokerError::REJECTED);
        }
        cmd.posted();
        Ok(())
    }

    fn cmd_poll(&self, cmd: &Command) -> Result<CmdStatus> {
        let seq = cmd.private::<Seq>().map_or(u64::MAX, |s| s.0);
        if seq >= self.hw.completed.load(Ordering::SeqCst) {
            Ok(CmdStatus::Pending)
        } else if self.hw.failed.lock().unwrap().contains(&seq) {
            Err(BrokerError::HARDWARE)
        } else {
            Ok(CmdStatus::Complete)
        }
    }

    fn channel_free(&self) {
        self.freed.lock().unwrap().push(self.hw.number);
    }
}

/// Device-level mock
#[derive(Debug, Default)]
pub struct MockDevice {
    channels: Mutex<Vec<Arc<MockChannel>>>,
    fail_channel_at: Option<usize>,
    root: Option<NodeId>,
    freed: Arc<Mutex<Vec<u32>>>,
    completions: Mutex<Vec<Result<()>>>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn under_root(root: NodeId) -> Arc<Self> {
        Arc::new(Self {
            root: Some(root),
            ..Self::default()
        })
    }

    pub fn failing_at(index: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_channel_at: Some(index),
            ..Self::default()
        })
    }

    pub fn channel(&self, number: usize) -> Arc<MockChannel> {
        self.channels.lock().unwrap()[number].clone()
    }

    pub fn channel_by_id(&self, id: ChannelId) -> Arc<MockChannel> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .expect("channel belongs to this device")
    }

    pub fn freed_channels(&self) -> Vec<u32> {
        self.freed.lock().unwrap().clone()
    }

    pub fn unregister_completions(&self) -> Vec<Result<()>> {
        self.completions.lock().unwrap().clone()
    }
}

impl DeviceBackend for MockDevice {
    fn channel_alloc(
        &self,
        channel: ChannelId,
        _flags: ChannelAllocFlags,
        queue_depth: u32,
    ) -> Result<(ChannelInfo, Box<dyn ChannelBackend>)> {
        let mut channels = self.channels.lock().unwrap();
        let number = channels.len();
        if self.fail_channel_at == Some(number) {
            return Err(BrokerError::REJECTED);
        }
        let hw = Arc::new(MockChannel {
            id: channel,
            number: number as u32,
            next_seq: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: Mutex::new(Vec::new()),
            reject_posts: AtomicBool::new(false),
            freed_cmds: AtomicUsize::new(0),
        });
        channels.push(hw.clone());
        let info = ChannelInfo {
            id: 0xd000 + number as u64,
            capabilities: Capabilities::COPY | Capabilities::NOSNOOP,
            queue_depth,
            channel_number: number as u32,
            root: self.root,
        };
        Ok((
            info,
            Box::new(MockChannelBackend {
                hw,
                freed: self.freed.clone(),
            }),
        ))
    }

    fn unregister_complete(&self, status: Result<()>) {
        self.completions.lock().unwrap().push(status);
    }
}

/// Hooks that count transitions
#[derive(Debug, Default)]
pub struct RecordingHooks {
    pub enables: AtomicUsize,
    pub disables: AtomicUsize,
    pub relaxes: AtomicUsize,
}

impl PlatformHooks for RecordingHooks {
    fn copy_offload_enable(&self) {
        self.enables.fetch_add(1, Ordering::SeqCst);
    }

    fn copy_offload_disable(&self) {
        self.disables.fetch_add(1, Ordering::SeqCst);
    }

    fn relax(&self) {
        self.relaxes.fetch_add(1, Ordering::SeqCst);
        std::thread::yield_now();
    }
}

impl RecordingHooks {
    pub fn counts(&self) -> (usize, usize) {
        (
            self.enables.load(Ordering::SeqCst),
            self.disables.load(Ordering::SeqCst),
        )
    }

    pub fn relaxes(&self) -> usize {
        self.relaxes.load(Ordering::SeqCst)
    }
}

pub fn broker() -> (Broker, Arc<RecordingHooks>) {
    let hooks = Arc::new(RecordingHooks::default());
    let broker = Broker::new(BrokerConfig::default().with_queue_depth(256), hooks.clone());
    (broker, hooks)
}

pub fn info(instance: u32, channel_count: usize) -> DeviceInfo {
    DeviceInfo {
        node: NodeId(100 + u64::from(instance)),
        driver: "ioat",
        instance,
        channel_count,
    }
}

pub fn register(
    broker: &Broker,
    instance: u32,
    channels: usize,
) -> (DeviceHandle, Arc<MockDevice>) {
    register_with(broker, MockDevice::new(), instance, channels)
}

pub fn register_with(
    broker: &Broker,
    device: Arc<MockDevice>,
    instance: u32,
    channels: usize,
) -> (DeviceHandle, Arc<MockDevice>) {
    let handle = broker
        .register(device.clone(), info(instance, channels))
        .expect("registration succeeds");
    (handle, device)
}
