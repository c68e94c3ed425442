// src/sync/lock_manager.rs

//! Lock management and deadlock prevention
//!
//! This module provides the broker's lock discipline:
//! - Lock ordering enforcement for nested acquisition
//! - Contention accounting
//! - Diagnostic information collection
//!
//! Every broker mutex is an [`OrderedMutex`] tagged with a [`LockId`]. A lock
//! taken while another is held must go through
//! [`OrderedMutex::lock_nested`], which checks that the new lock sits
//! strictly after the held one.

use alloc::sync::Arc;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU64, Ordering};

use spin::{Mutex, MutexGuard};

/// Lock identifiers with defined ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LockId {
    /// Global channel pool (must be acquired first)
    Pool = 0,
    /// A device's channel list and drain counter
    DeviceChannels = 1,
    /// Registered device list
    DeviceList = 2,
    /// A channel's poll set
    PollSet = 3,
    /// A command's control block (innermost)
    Command = 4,
}

impl LockId {
    /// Number of lock levels
    pub const COUNT: usize = 5;

    /// All levels in acquisition order
    pub const ALL: [LockId; LockId::COUNT] = [
        LockId::Pool,
        LockId::DeviceChannels,
        LockId::DeviceList,
        LockId::PollSet,
        LockId::Command,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            LockId::Pool => "pool",
            LockId::DeviceChannels => "device-channels",
            LockId::DeviceList => "device-list",
            LockId::PollSet => "poll-set",
            LockId::Command => "command",
        }
    }
}

/// Lock ordering violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOrderViolation {
    /// Lock level already held by the caller
    AlreadyHeld(LockId),
    /// Attempting to acquire in wrong order
    OrderingViolation { requested: LockId, held: LockId },
}

/// Check that `requested` may be acquired while `held` is held
pub fn check_order(held: LockId, requested: LockId) -> Result<(), LockOrderViolation> {
    if held == requested {
        return Err(LockOrderViolation::AlreadyHeld(requested));
    }
    if requested < held {
        return Err(LockOrderViolation::OrderingViolation { requested, held });
    }
    Ok(())
}

#[derive(Debug, Default)]
struct LockCounters {
    acquisitions: AtomicU64,
    contentions: AtomicU64,
    order_violations: AtomicU64,
}

/// Lock statistics for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStats {
    pub id: LockId,
    pub acquisitions: u64,
    /// Acquisitions that found the lock already taken
    pub contentions: u64,
    pub order_violations: u64,
}

/// Per-level counters shared by every lock of one broker
#[derive(Debug, Default)]
pub struct LockRegistry {
    counters: [LockCounters; LockId::COUNT],
}

impl LockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn counters(&self, id: LockId) -> &LockCounters {
        &self.counters[id as usize]
    }

    /// Statistics for one lock level
    pub fn stats(&self, id: LockId) -> LockStats {
        let c = self.counters(id);
        LockStats {
            id,
            acquisitions: c.acquisitions.load(Ordering::Relaxed),
            contentions: c.contentions.load(Ordering::Relaxed),
            order_violations: c.order_violations.load(Ordering::Relaxed),
        }
    }

    /// Statistics for every lock level, in acquisition order
    pub fn all(&self) -> [LockStats; LockId::COUNT] {
        LockId::ALL.map(|id| self.stats(id))
    }
}

/// Spin mutex tagged with its place in the lock order
pub struct OrderedMutex<T> {
    id: LockId,
    inner: Mutex<T>,
    registry: Arc<LockRegistry>,
}

impl<T> OrderedMutex<T> {
    pub fn new(id: LockId, value: T, registry: Arc<LockRegistry>) -> Self {
        Self {
            id,
            inner: Mutex::new(value),
            registry,
        }
    }

    #[inline]
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire with no other broker lock held
    pub fn lock(&self) -> OrderedGuard<'_, T> {
        self.acquire()
    }

    /// Acquire while `outer` is held
    ///
    /// An out-of-order request is counted and logged; debug builds assert.
    pub fn lock_nested<U>(&self, outer: &OrderedGuard<'_, U>) -> OrderedGuard<'_, T> {
        if let Err(violation) = check_order(outer.id, self.id) {
            self.registry
                .counters(self.id)
                .order_violations
                .fetch_add(1, Ordering::Relaxed);
            log::warn!("lock order violation: {:?}", violation);
            debug_assert!(false, "lock order violation: {:?}", violation);
        }
        self.acquire()
    }

    fn acquire(&self) -> OrderedGuard<'_, T> {
        let counters = self.registry.counters(self.id);
        let guard = match self.inner.try_lock() {
            Some(guard) => guard,
            None => {
                counters.contentions.fetch_add(1, Ordering::Relaxed);
                self.inner.lock()
            }
        };
        counters.acquisitions.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "lock-trace")]
        log::trace!("acquired {} lock", self.id.as_str());

        OrderedGuard {
            id: self.id,
            guard,
        }
    }
}

impl<T> core::fmt::Debug for OrderedMutex<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderedMutex")
            .field("id", &self.id)
            .field("locked", &self.inner.is_locked())
            .finish()
    }
}

/// Guard that remembers which level it holds
pub struct OrderedGuard<'a, T> {
    id: LockId,
    guard: MutexGuard<'a, T>,
}

impl<T> OrderedGuard<'_, T> {
    #[inline]
    pub fn id(&self) -> LockId {
        self.id
    }
}

impl<T> Deref for OrderedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for OrderedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
