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

//! Gapless named sequences.
//!
//! Issues strictly increasing integers with no gaps and no duplicates
//! under concurrent callers. The read-increment-write is a single atomic
//! `fetch_add` per named counter, so issuance order across threads may
//! differ from call-arrival order, but the issued set is always dense.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Named monotonically increasing counters (check numbers, receipt
/// numbers, ...).
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    sequences: DashMap<String, AtomicU64>,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self {
            sequences: DashMap::new(),
        }
    }

    /// Seeds a sequence so the next issued value is `start + 1`.
    ///
    /// Registering an existing sequence is a no-op; the live counter is
    /// never rewound.
    pub fn register(&self, name: &str, start: u64) {
        self.sequences
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(start));
    }

    /// Issues the next value of a sequence, creating it (from zero) on
    /// first use.
    pub fn next(&self, name: &str) -> u64 {
        self.sequences
            .entry(name.to_string())
            .or_default()
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }

    /// The most recently issued value, without issuing a new one.
    pub fn current(&self, name: &str) -> u64 {
        self.sequences
            .get(name)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}
