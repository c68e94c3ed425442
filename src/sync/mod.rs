// src/sync/mod.rs

//! Synchronization primitives and lock management
//!
//! This module provides deadlock-prevention mechanisms through enforced lock
//! ordering, plus the one-shot slot used by blocking command polls.
//!
//! # Lock Ordering
//!
//! Locks must be acquired in a specific order to prevent deadlocks:
//! 1. Global channel pool
//! 2. A device's channel list
//! 3. Registered device list
//! 4. A channel's poll set
//! 5. A command's control block
//!
//! Statistics counters are atomics and never need a lock.
//!
//! # Example
//!
//! ```
//! use dma_broker::sync::{LockId, LockRegistry, OrderedMutex};
//!
//! let registry = LockRegistry::new();
//! let pool = OrderedMutex::new(LockId::Pool, (), registry.clone());
//! let device = OrderedMutex::new(LockId::DeviceChannels, (), registry.clone());
//!
//! let outer = pool.lock();
//! let _inner = device.lock_nested(&outer);
//! // Locks are released when dropped
//! ```

pub mod completion;
pub mod lock_manager;

// Re-export commonly used types
pub use completion::{wait_for, Completion};
pub use lock_manager::{
    check_order, LockId, LockOrderViolation, LockRegistry, LockStats, OrderedGuard, OrderedMutex,
};
