// src/broker/command.rs

//! Command lifecycle
//!
//! ```text
//!  cmd_alloc ──► set_op / set_flags ──► post ──► (backend) posted ──► poll ──► free
//!                                                     │                  ▲
//!                                                     └─ INTR: poll set ─┘ notifier
//! ```
//!
//! A command is a shared record: the client owns the [`Command`] returned by
//! [`ChannelHandle::cmd_alloc`](crate::ChannelHandle::cmd_alloc), and while
//! an interrupt-driven command is in flight its channel's poll set holds a
//! second reference so the notifier can reach it.

use alloc::sync::Arc;
use core::any::Any;

use spin::Mutex;

use super::channel::Channel;
use super::ChannelId;
use crate::backend::CommandPrivate;
use crate::errors::{FailureKind, Result};
use crate::list::ListKey;
use crate::sync::{wait_for, Completion, LockId, OrderedMutex};
use crate::types::{CmdAllocFlags, CmdFlags, CmdOp, CmdStatus, PollFlags};

/// What the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Descriptor {
    pub op: CmdOp,
    pub flags: CmdFlags,
}

/// Broker-side control block, guarded by the command's own lock
pub(super) struct ControlBlock {
    /// Last result recorded by the notifier
    result: Result<()>,
    /// Blocked poller, if any
    waiter: Completion<Result<()>>,
    /// Membership in the channel's poll set
    poll_key: Option<ListKey>,
}

impl ControlBlock {
    const fn new() -> Self {
        Self {
            result: Err(crate::errors::BrokerError::Failure(FailureKind::Unresolved)),
            waiter: Completion::new(),
            poll_key: None,
        }
    }

    /// Record the final result and wake a blocked poller
    pub(super) fn resolve(&mut self, result: Result<()>) {
        self.poll_key = None;
        self.result = result;
        self.waiter.fire(result);
    }
}

struct CommandInner {
    channel: Arc<Channel>,
    /// Leaf lock; never held across a backend call
    descriptor: Mutex<Descriptor>,
    control: OrderedMutex<ControlBlock>,
    private: CommandPrivate,
}

/// One asynchronous operation on a channel
pub struct Command {
    inner: Arc<CommandInner>,
}

impl Command {
    pub(super) fn alloc(
        channel: &Arc<Channel>,
        flags: CmdAllocFlags,
        link: Option<&Command>,
    ) -> Result<Command> {
        let link = match (flags.contains(CmdAllocFlags::LINK), link) {
            (true, Some(prev)) if Arc::ptr_eq(&prev.inner.channel, channel) => Some(prev),
            (false, None) => None,
            _ => return Err(FailureKind::InvalidArgument.into()),
        };

        channel.counters().cmd_alloc.inc();
        let private = channel.backend().cmd_alloc(flags, link)?;

        Ok(Command {
            inner: Arc::new(CommandInner {
                channel: channel.clone(),
                descriptor: Mutex::new(Descriptor::default()),
                control: OrderedMutex::new(
                    LockId::Command,
                    ControlBlock::new(),
                    channel.locks().clone(),
                ),
                private,
            }),
        })
    }

    /// Second reference for the poll set
    fn share(&self) -> Command {
        Command {
            inner: self.inner.clone(),
        }
    }

    /// Channel the command is bound to
    pub fn channel(&self) -> ChannelId {
        self.inner.channel.id()
    }

    pub fn set_op(&self, op: CmdOp) {
        self.inner.descriptor.lock().op = op;
    }

    pub fn set_flags(&self, flags: CmdFlags) {
        self.inner.descriptor.lock().flags = flags;
    }

    pub fn descriptor(&self) -> Descriptor {
        *self.inner.descriptor.lock()
    }

    /// Backend-private state created at allocation
    pub fn private<T: Any>(&self) -> Option<&T> {
        (*self.inner.private).downcast_ref::<T>()
    }

    /// Last result recorded by the completion notifier
    ///
    /// `Unresolved` until the notifier retires the command.
    pub fn result(&self) -> Result<()> {
        self.inner.control.lock().result
    }

    /// Whether the command sits in its channel's poll set
    pub fn is_tracked(&self) -> bool {
        self.inner.control.lock().poll_key.is_some()
    }

    /// Hand the command to the backend
    ///
    /// `Ok` means the backend accepted it, not that the hardware started.
    pub fn post(&self) -> Result<()> {
        let channel = &self.inner.channel;
        let desc = self.descriptor();

        channel.counters().cmd_post.inc();
        channel.counters().bytes_xfer.add(desc.op.bytes());

        channel.backend().cmd_post(self)
    }

    /// Backend hook: the command is queued and the hardware not yet kicked
    ///
    /// Interrupt-driven commands join the poll set here. Calling it twice
    /// does not track the command twice.
    pub fn posted(&self) {
        if !self.descriptor().flags.contains(CmdFlags::INTR) {
            return;
        }
        let channel = &self.inner.channel;
        let mut poll_set = channel.poll_set().lock();
        let mut control = self.inner.control.lock_nested(&poll_set);
        if control.poll_key.is_none() {
            control.poll_key = Some(poll_set.push_back(self.share()));
        }
    }

    /// Current status of the command
    ///
    /// With [`PollFlags::BLOCK`] a pending command parks the caller until
    /// the notifier retires it; that requires the command to have been
    /// posted with [`CmdFlags::INTR`]. There is no timeout.
    pub fn poll(&self, flags: PollFlags) -> Result<CmdStatus> {
        let channel = &self.inner.channel;
        let block = flags.contains(PollFlags::BLOCK);
        if block && !self.descriptor().flags.contains(CmdFlags::INTR) {
            return Err(FailureKind::NotWaitable.into());
        }

        channel.counters().cmd_poll.inc();

        let mut control = self.inner.control.lock();
        let status = channel.backend().cmd_poll(self)?;
        if status == CmdStatus::Complete || !block {
            return Ok(status);
        }
        control.waiter.arm();
        drop(control);

        wait_for(
            || self.inner.control.lock().waiter.take(),
            || channel.hooks().relax(),
        )?;
        Ok(CmdStatus::Complete)
    }

    /// Release the command
    ///
    /// The caller must not have a blocking poll outstanding on it.
    pub fn free(self) {
        let channel = &self.inner.channel;
        let tracked = {
            let mut poll_set = channel.poll_set().lock();
            let mut control = self.inner.control.lock_nested(&poll_set);
            control
                .poll_key
                .take()
                .and_then(|key| poll_set.remove(key))
        };
        drop(tracked);
        channel.backend().cmd_free(&self);
    }

    /// Lock the control block while the poll set is held
    pub(super) fn control_nested<'a, U>(
        &'a self,
        outer: &crate::sync::OrderedGuard<'_, U>,
    ) -> crate::sync::OrderedGuard<'a, ControlBlock> {
        self.inner.control.lock_nested(outer)
    }
}

impl core::fmt::Debug for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Command")
            .field("channel", &self.inner.channel.id())
            .field("descriptor", &self.descriptor())
            .finish()
    }
}
