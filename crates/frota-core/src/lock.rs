//! Advisory edit locks and per-order serialization of mutating calls.
//!
//! Two distinct mechanisms live here:
//!
//! - [`LockPolicy`] decides who may hold the *edit lock* recorded on a work
//!   order (`locked_by`/`locked_at`). It is advisory: a lock older than
//!   `max_age` is considered abandoned and the next `acquire` takes it over.
//!   There is no expiry daemon; staleness is evaluated lazily.
//! - [`KeyedMutex`] serializes mutating calls per order id inside one process
//!   so two concurrent transitions can never read the same
//!   `last_status_change`.

use crate::error::ErrorCode;
use crate::model::{EditLock, WorkOrder};
use chrono::{DateTime, Utc};
use std::{
    collections::HashSet,
    sync::{Condvar, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::info;

/// Default age, in minutes, after which an edit lock is treated as abandoned.
pub const DEFAULT_LOCK_MAX_AGE_MINUTES: i64 = 30;

/// Lock errors for edit locks and per-order serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Another user holds a fresh edit lock.
    AlreadyLocked {
        order_id: String,
        holder: String,
        locked_at: DateTime<Utc>,
    },
    /// Another mutating call on the same order did not finish in time.
    Busy { order_id: String, waited: Duration },
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyLocked { .. } => ErrorCode::AlreadyLocked,
            Self::Busy { .. } => ErrorCode::VersionConflict,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyLocked {
                order_id,
                holder,
                locked_at,
            } => write!(
                f,
                "{}: {order_id} is being edited by {holder} since {locked_at}",
                self.code().code()
            ),
            Self::Busy { order_id, waited } => write!(
                f,
                "{}: {order_id} is busy with another update (waited {waited:?})",
                self.code().code()
            ),
        }
    }
}

impl std::error::Error for LockError {}

/// How an edit lock ended up with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// No lock was present.
    Fresh,
    /// The caller already held it; `locked_at` was refreshed.
    Refreshed,
    /// A stale lock held by someone else was taken over.
    TakenOver { previous_holder: String },
}

/// Edit-lock rules, parameterized by the abandonment threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub max_age: chrono::Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_age: chrono::Duration::minutes(DEFAULT_LOCK_MAX_AGE_MINUTES),
        }
    }
}

impl LockPolicy {
    #[must_use]
    pub const fn new(max_age: chrono::Duration) -> Self {
        Self { max_age }
    }

    /// True if `user_id` may edit the order at `now`: the lock is absent,
    /// held by `user_id`, or stale.
    #[must_use]
    pub fn is_editable(&self, order: &WorkOrder, user_id: &str, now: DateTime<Utc>) -> bool {
        order
            .lock
            .as_ref()
            .is_none_or(|lock| lock.holder == user_id || lock.is_stale(now, self.max_age))
    }

    /// Take the edit lock for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::AlreadyLocked`] only when a different user holds a
    /// lock younger than `max_age`.
    pub fn acquire(
        &self,
        order: &mut WorkOrder,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Acquired, LockError> {
        let outcome = match order.lock.as_ref() {
            None => Acquired::Fresh,
            Some(lock) if lock.holder == user_id => Acquired::Refreshed,
            Some(lock) if lock.is_stale(now, self.max_age) => {
                info!(
                    order_id = %order.id,
                    previous_holder = %lock.holder,
                    new_holder = user_id,
                    age_secs = lock.age(now).num_seconds(),
                    "taking over abandoned edit lock"
                );
                Acquired::TakenOver {
                    previous_holder: lock.holder.clone(),
                }
            }
            Some(lock) => {
                return Err(LockError::AlreadyLocked {
                    order_id: order.id.clone(),
                    holder: lock.holder.clone(),
                    locked_at: lock.locked_at,
                });
            }
        };

        order.lock = Some(EditLock {
            holder: user_id.to_string(),
            locked_at: now,
        });
        Ok(outcome)
    }

    /// Release the edit lock if `user_id` holds it.
    ///
    /// Returns whether a lock was cleared. Releasing a lock you don't hold is
    /// a no-op, so the call is idempotent.
    pub fn release(&self, order: &mut WorkOrder, user_id: &str) -> bool {
        if order.lock.as_ref().is_some_and(|lock| lock.holder == user_id) {
            order.lock = None;
            true
        } else {
            false
        }
    }
}

/// Table of per-key mutual exclusion for mutating calls.
///
/// Keys are only present while a guard is outstanding, so the table never
/// grows beyond the number of in-flight mutations.
#[derive(Debug, Default)]
pub struct KeyedMutex {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl KeyedMutex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `key`.
    ///
    /// A zero timeout fails fast when the key is held.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Busy`] if the key stayed held for `timeout`.
    pub fn lock(&self, key: &str, timeout: Duration) -> Result<KeyGuard<'_>, LockError> {
        let start = Instant::now();
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        while held.contains(key) {
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(LockError::Busy {
                    order_id: key.to_string(),
                    waited,
                });
            }
            let (next, _) = self
                .released
                .wait_timeout(held, timeout.saturating_sub(waited))
                .unwrap_or_else(PoisonError::into_inner);
            held = next;
        }

        held.insert(key.to_string());
        Ok(KeyGuard {
            table: self,
            key: key.to_string(),
        })
    }

    /// Fail-fast variant of [`Self::lock`].
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Busy`] if the key is currently held.
    pub fn try_lock(&self, key: &str) -> Result<KeyGuard<'_>, LockError> {
        self.lock(key, Duration::ZERO)
    }

    /// Number of keys currently held.
    #[cfg(test)]
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn unlock(&self, key: &str) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(key);
        drop(held);
        self.released.notify_all();
    }
}

/// RAII guard for one key of a [`KeyedMutex`].
#[derive(Debug)]
pub struct KeyGuard<'a> {
    table: &'a KeyedMutex,
    key: String,
}

#[cfg(test)]
impl KeyGuard<'_> {
    /// Return the guarded key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Explicitly release the key. Release also happens automatically on drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.table.unlock(&self.key);
    }
}
