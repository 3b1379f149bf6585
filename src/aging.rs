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

//! Accounts-receivable aging.
//!
//! Each tenant has one set of buckets grouping outstanding receivables by
//! days past due. A new charge lands in exactly one bucket, chosen from
//! its due date at charge time; bucket assignment does not migrate as
//! time passes. Payments are applied strictly oldest-bucket-first, and a
//! remainder beyond all receivables drives `current` negative — a
//! prepayment credit.
//!
//! `total` is recomputed as the sum of the five buckets after every
//! mutation.

use crate::base::TenantId;
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// The bucket a receivable ages into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    Current,
    Days30,
    Days60,
    Days90,
    Days90Plus,
}

/// Selects the bucket for a charge from its due date.
///
/// `days_past_due <= 0` is `current`, `1..=30` is `days_30`, `31..=60`
/// is `days_60`, `61..=90` is `days_90`, anything older is
/// `days_90_plus`.
pub fn bucket_for(due_date: NaiveDate, as_of: NaiveDate) -> AgeBucket {
    let days_past_due = (as_of - due_date).num_days();
    match days_past_due {
        ..=0 => AgeBucket::Current,
        1..=30 => AgeBucket::Days30,
        31..=60 => AgeBucket::Days60,
        61..=90 => AgeBucket::Days90,
        _ => AgeBucket::Days90Plus,
    }
}

/// One tenant's receivables bucketed by age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingBuckets {
    pub current: Decimal,
    pub days_30: Decimal,
    pub days_60: Decimal,
    pub days_90: Decimal,
    pub days_90_plus: Decimal,
    /// Always the sum of the five buckets.
    pub total: Decimal,
}

impl AgingBuckets {
    pub fn zero() -> Self {
        Self {
            current: Decimal::ZERO,
            days_30: Decimal::ZERO,
            days_60: Decimal::ZERO,
            days_90: Decimal::ZERO,
            days_90_plus: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }

    fn bucket_mut(&mut self, bucket: AgeBucket) -> &mut Decimal {
        match bucket {
            AgeBucket::Current => &mut self.current,
            AgeBucket::Days30 => &mut self.days_30,
            AgeBucket::Days60 => &mut self.days_60,
            AgeBucket::Days90 => &mut self.days_90,
            AgeBucket::Days90Plus => &mut self.days_90_plus,
        }
    }

    fn recompute_total(&mut self) {
        self.total = self.current + self.days_30 + self.days_60 + self.days_90 + self.days_90_plus;
    }

    /// Whether `total` matches the bucket sum.
    pub fn is_consistent(&self) -> bool {
        self.total
            == self.current + self.days_30 + self.days_60 + self.days_90 + self.days_90_plus
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.is_consistent(),
            "Invariant violated: aging total {} does not match bucket sum",
            self.total
        );
    }

    fn add_charge(&mut self, amount: Decimal, bucket: AgeBucket) {
        *self.bucket_mut(bucket) += amount;
        self.recompute_total();
        self.assert_invariants();
    }

    /// Applies a payment oldest-bucket-first.
    ///
    /// Any amount left after the aged buckets are drained is subtracted
    /// from `current`, which may go negative (prepayment credit).
    fn apply_payment(&mut self, amount: Decimal) {
        let mut remaining = amount;
        drain(&mut self.days_90_plus, &mut remaining);
        drain(&mut self.days_90, &mut remaining);
        drain(&mut self.days_60, &mut remaining);
        drain(&mut self.days_30, &mut remaining);
        self.current -= remaining;
        self.recompute_total();
        self.assert_invariants();
    }
}

impl Default for AgingBuckets {
    fn default() -> Self {
        Self::zero()
    }
}

/// Consumes `min(remaining, balance)` from a bucket, never below zero.
fn drain(balance: &mut Decimal, remaining: &mut Decimal) {
    if *remaining <= Decimal::ZERO || *balance <= Decimal::ZERO {
        return;
    }
    let take = (*remaining).min(*balance);
    *balance -= take;
    *remaining -= take;
}

/// Per-tenant AR aging allocator.
///
/// Each tenant's buckets are an independent critical section; mutating
/// one tenant never blocks another.
#[derive(Debug)]
pub struct ArAging {
    tenants: DashMap<TenantId, Arc<Mutex<AgingBuckets>>>,
}

impl ArAging {
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
        }
    }

    fn tenant(&self, tenant_id: TenantId) -> Arc<Mutex<AgingBuckets>> {
        self.tenants.entry(tenant_id).or_default().clone()
    }

    /// Places the full charge amount into the bucket computed from its
    /// due date as of `as_of`.
    pub fn add_charge(
        &self,
        tenant_id: TenantId,
        amount: Decimal,
        due_date: NaiveDate,
        as_of: NaiveDate,
    ) {
        let bucket = bucket_for(due_date, as_of);
        self.tenant(tenant_id).lock().add_charge(amount, bucket);
    }

    /// Applies a payment for one tenant oldest-bucket-first.
    pub fn apply_payment(&self, tenant_id: TenantId, amount: Decimal) {
        self.tenant(tenant_id).lock().apply_payment(amount);
    }

    /// Snapshot of one tenant's buckets; all-zero when the tenant has no
    /// aging data.
    pub fn buckets(&self, tenant_id: TenantId) -> AgingBuckets {
        match self.tenants.get(&tenant_id) {
            Some(entry) => entry.lock().clone(),
            None => AgingBuckets::zero(),
        }
    }
}

impl Default for ArAging {
    fn default() -> Self {
        Self::new()
    }
}
