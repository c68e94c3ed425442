// src/sync/completion.rs

//! One-shot completion slot
//!
//! A single waiter arms the slot, a single notifier fires it with the final
//! value, the waiter takes the value exactly once. The slot itself carries no
//! lock: it lives inside the owner's mutex so that "check status, then arm"
//! and "check armed, then fire" are each atomic with respect to the other.
//!
//! ```text
//!  waiter                       notifier
//!  ──────                       ────────
//!  lock; poll → PENDING
//!  arm(); unlock
//!                               lock; poll → done
//!                               fire(result) → true; unlock
//!  lock; take() → Some(result)
//! ```

/// One-shot slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Completion<T> {
    /// No waiter
    #[default]
    Idle,
    /// A waiter is parked on this slot
    Armed,
    /// Value delivered, not yet taken
    Fired(T),
}

impl<T> Completion<T> {
    pub const fn new() -> Self {
        Completion::Idle
    }

    /// Park a waiter on this slot
    pub fn arm(&mut self) {
        *self = Completion::Armed;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        matches!(self, Completion::Armed)
    }

    /// Deliver `value` if a waiter is armed
    ///
    /// Returns `false` (dropping `value`) when nobody is waiting.
    pub fn fire(&mut self, value: T) -> bool {
        if !self.is_armed() {
            return false;
        }
        *self = Completion::Fired(value);
        true
    }

    /// Take a delivered value, resetting the slot to idle
    pub fn take(&mut self) -> Option<T> {
        match core::mem::replace(self, Completion::Idle) {
            Completion::Fired(value) => Some(value),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// Re-checks preceded by a busy spin (1, 2, 4 .. 64 iterations)
const SPIN_ROUNDS: u32 = 7;

/// Wait until `check` yields a value
///
/// `check` is expected to take the owner's lock, call
/// [`Completion::take`] and release the lock again. The first re-checks
/// are separated by a doubling busy spin; after that `relax` runs between
/// every two re-checks, with no lock held, and may yield or park.
pub fn wait_for<T>(mut check: impl FnMut() -> Option<T>, mut relax: impl FnMut()) -> T {
    let mut round: u32 = 0;
    loop {
        if let Some(value) = check() {
            return value;
        }
        if round < SPIN_ROUNDS {
            for _ in 0..(1u32 << round) {
                core::hint::spin_loop();
            }
            round += 1;
        } else {
            relax();
        }
    }
}
