// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Idempotency store.
//!
//! Deduplicates and serializes operations keyed by a caller-supplied
//! idempotency key. For any one key, at most one caller's work executes;
//! every other concurrent caller blocks on that key's condvar (bounded)
//! and then observes the winner's recorded result. Waiting never spins:
//! losers park on a real [`Condvar`] and are woken when the winner
//! finishes.
//!
//! Records are immutable once written.

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The stored result of a completed operation.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord<T> {
    pub result: T,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of an idempotent execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Idempotent<T> {
    /// This caller won the key and executed the work.
    Fresh(T),
    /// The work was already done (possibly just now, by a concurrent
    /// caller); this is the winner's result.
    Replayed(T),
}

impl<T> Idempotent<T> {
    pub fn into_inner(self) -> T {
        match self {
            Idempotent::Fresh(value) | Idempotent::Replayed(value) => value,
        }
    }
}

#[derive(Debug)]
struct InFlightSlot {
    done: Mutex<bool>,
    cond: Condvar,
}

impl InFlightSlot {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cond: Condvar::new(),
        }
    }
}

/// Keyed at-most-once execution store.
#[derive(Debug)]
pub struct IdempotencyStore<T: Clone> {
    /// Completed results, immutable once written.
    records: DashMap<String, IdempotencyRecord<T>>,
    /// One slot per key currently being worked on.
    in_flight: DashMap<String, Arc<InFlightSlot>>,
}

impl<T: Clone> IdempotencyStore<T> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Returns the recorded result for a key, if the work completed.
    pub fn record(&self, key: &str) -> Option<IdempotencyRecord<T>> {
        self.records.get(key).map(|r| r.clone())
    }

    /// Records a result for a key. The first write wins; later writes
    /// for the same key are ignored.
    pub fn set_record(&self, key: &str, result: T) {
        self.records
            .entry(key.to_string())
            .or_insert_with(|| IdempotencyRecord {
                result,
                processed_at: Utc::now(),
            });
    }

    /// Non-blocking lock acquisition. Returns `false` if the key is
    /// already held.
    pub fn try_acquire(&self, key: &str) -> bool {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(InFlightSlot::new()));
                true
            }
        }
    }

    /// Releases a held key and wakes every waiter.
    pub fn release(&self, key: &str) {
        if let Some((_, slot)) = self.in_flight.remove(key) {
            let mut done = slot.done.lock();
            *done = true;
            slot.cond.notify_all();
        }
    }

    /// Runs `work` at most once per key.
    ///
    /// The fast path returns an existing record without locking. If the
    /// key is in flight elsewhere, this caller waits up to `wait` for the
    /// holder to finish and then observes the recorded result.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Contention`] - the wait expired without a record
    ///   appearing (the holder is slow, or it failed and recorded
    ///   nothing). Retryable.
    /// - Any error returned by `work`; no record is written for it.
    pub fn execute<F>(&self, key: &str, wait: Duration, work: F) -> Result<Idempotent<T>, LedgerError>
    where
        F: FnOnce() -> Result<T, LedgerError>,
    {
        if let Some(record) = self.record(key) {
            return Ok(Idempotent::Replayed(record.result));
        }

        let slot = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                let slot = Arc::clone(entry.get());
                // Release the map shard before parking.
                drop(entry);
                let deadline = Instant::now() + wait;
                let mut done = slot.done.lock();
                while !*done {
                    if slot.cond.wait_until(&mut done, deadline).timed_out() {
                        break;
                    }
                }
                drop(done);
                return match self.record(key) {
                    Some(record) => Ok(Idempotent::Replayed(record.result)),
                    None => Err(LedgerError::Contention {
                        key: key.to_string(),
                    }),
                };
            }
            Entry::Vacant(entry) => {
                let slot = Arc::new(InFlightSlot::new());
                entry.insert(Arc::clone(&slot));
                slot
            }
        };

        // The previous holder may have finished between the record check
        // and the slot insertion; re-check before executing.
        if let Some(record) = self.record(key) {
            self.finish(key, &slot);
            return Ok(Idempotent::Replayed(record.result));
        }

        match work() {
            Ok(result) => {
                self.set_record(key, result.clone());
                self.finish(key, &slot);
                Ok(Idempotent::Fresh(result))
            }
            Err(error) => {
                self.finish(key, &slot);
                Err(error)
            }
        }
    }

    fn finish(&self, key: &str, slot: &InFlightSlot) {
        self.in_flight.remove(key);
        let mut done = slot.done.lock();
        *done = true;
        slot.cond.notify_all();
    }
}

impl<T: Clone> Default for IdempotencyStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
