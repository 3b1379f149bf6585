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

//! Per-tenant running ledger.
//!
//! Every charge, payment, credit or adjustment appends one entry carrying
//! the tenant balance immediately after it, so the current balance is an
//! O(1) read of the last entry.

use crate::base::TenantId;
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of tenant ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantEntryKind {
    Charge,
    Payment,
    Credit,
    Adjustment,
}

/// One appended tenant ledger line.
///
/// `amount_signed` increases the tenant balance for charges and
/// adjustments and decreases it for payments and credits.
#[derive(Debug, Clone, Serialize)]
pub struct TenantLedgerEntry {
    pub id: u64,
    pub tenant_id: TenantId,
    pub kind: TenantEntryKind,
    pub amount_signed: Decimal,
    /// Tenant balance immediately after this entry.
    pub running_balance: Decimal,
    pub description: String,
    pub date: NaiveDate,
}

/// Append-only tenant ledgers, one independently locked log per tenant.
#[derive(Debug)]
pub struct TenantLedger {
    tenants: DashMap<TenantId, Arc<Mutex<Vec<TenantLedgerEntry>>>>,
    next_id: AtomicU64,
}

impl TenantLedger {
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    fn tenant(&self, tenant_id: TenantId) -> Arc<Mutex<Vec<TenantLedgerEntry>>> {
        self.tenants.entry(tenant_id).or_default().clone()
    }

    /// Appends an entry and returns the resulting running balance.
    pub fn append(
        &self,
        tenant_id: TenantId,
        kind: TenantEntryKind,
        amount_signed: Decimal,
        description: impl Into<String>,
        date: NaiveDate,
    ) -> Decimal {
        let log = self.tenant(tenant_id);
        let mut entries = log.lock();
        let previous = entries
            .last()
            .map(|e| e.running_balance)
            .unwrap_or(Decimal::ZERO);
        let running_balance = previous + amount_signed;
        entries.push(TenantLedgerEntry {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            tenant_id,
            kind,
            amount_signed,
            running_balance,
            description: description.into(),
            date,
        });
        running_balance
    }

    /// Current balance: the last entry's running balance, zero with no
    /// entries.
    pub fn balance(&self, tenant_id: TenantId) -> Decimal {
        match self.tenants.get(&tenant_id) {
            Some(log) => log
                .lock()
                .last()
                .map(|e| e.running_balance)
                .unwrap_or(Decimal::ZERO),
            None => Decimal::ZERO,
        }
    }

    /// Snapshot of one tenant's full history, oldest first.
    pub fn entries(&self, tenant_id: TenantId) -> Vec<TenantLedgerEntry> {
        match (self.tenants.get(&tenant_id)).map(|log| log.lock().clone()) {
            Some(entries) => entries,
            None => Vec::new(),
        }
    }

    /// All tenants that have at least one entry.
    pub fn tenant_ids(&self) -> Vec<TenantId> {
        let mut ids: Vec<TenantId> = self.tenants.iter().map(|e| *e.key()).collect();
        ids.sort_by_key(|t| t.0);
        ids
    }
}

impl Default for TenantLedger {
    fn default() -> Self {
        Self::new()
    }
}
