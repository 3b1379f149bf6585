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

//! Account balance ledger.
//!
//! Holds one lock-protected balance cell per account in the chart.
//! Posting application is the only mutation path: all cells touched by
//! one journal entry are locked together (in canonical account order, so
//! concurrent applications cannot deadlock) and updated as a unit, so no
//! reader ever observes a partially-applied entry.

use crate::account::Account;
use crate::error::LedgerError;
use crate::journal::JournalPosting;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;

#[derive(Debug)]
struct BalanceCell {
    balance: Decimal,
    last_updated: DateTime<Utc>,
}

impl BalanceCell {
    fn new() -> Self {
        Self {
            balance: Decimal::ZERO,
            last_updated: Utc::now(),
        }
    }
}

/// Current balances for the fixed chart of accounts.
///
/// Every account starts at zero. Balances are never set directly; they
/// move only through [`BalanceLedger::apply`] /
/// [`BalanceLedger::apply_guarded`] with the postings of one balanced
/// journal entry.
#[derive(Debug)]
pub struct BalanceLedger {
    cells: [Mutex<BalanceCell>; Account::ALL.len()],
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self {
            cells: std::array::from_fn(|_| Mutex::new(BalanceCell::new())),
        }
    }

    fn cell(&self, account: Account) -> &Mutex<BalanceCell> {
        &self.cells[account as usize]
    }

    /// Returns the current balance of one account.
    ///
    /// Accounts that have never been posted to report zero.
    pub fn balance(&self, account: Account) -> Decimal {
        self.cell(account).lock().balance
    }

    /// When the account was last posted to.
    pub fn last_updated(&self, account: Account) -> DateTime<Utc> {
        self.cell(account).lock().last_updated
    }

    /// Applies all postings of one journal entry as a single atomic unit.
    ///
    /// The caller (the journal engine) has already verified the postings
    /// sum to zero, so application cannot fail.
    pub fn apply(&self, postings: &[JournalPosting]) {
        // Infallible without guarded accounts.
        let applied = self.apply_guarded(postings, &[]);
        debug_assert!(applied.is_ok());
    }

    /// Applies postings atomically, rejecting the whole entry if any
    /// account in `guards` would end up with a negative balance.
    ///
    /// Nothing is mutated on rejection. Under concurrent applications
    /// competing for the last funds in a guarded account, exactly the
    /// requests that fit succeed.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientFunds`] when a guarded account would go
    /// negative.
    pub fn apply_guarded(
        &self,
        postings: &[JournalPosting],
        guards: &[Account],
    ) -> Result<(), LedgerError> {
        debug_assert!(
            postings.iter().map(|p| p.amount).sum::<Decimal>() == Decimal::ZERO,
            "posting application requires a balanced entry"
        );

        let mut touched: Vec<Account> = postings.iter().map(|p| p.account).collect();
        touched.sort();
        touched.dedup();

        // Net delta per touched account, in the same order as `touched`.
        let deltas: Vec<Decimal> = touched
            .iter()
            .map(|account| {
                postings
                    .iter()
                    .filter(|p| p.account == *account)
                    .map(|p| p.amount)
                    .sum()
            })
            .collect();

        // Canonical order acquisition; Account::ALL order == Ord order.
        let mut locked: Vec<MutexGuard<'_, BalanceCell>> =
            touched.iter().map(|account| self.cell(*account).lock()).collect();

        for ((account, cell), delta) in touched.iter().zip(locked.iter()).zip(deltas.iter()) {
            if guards.contains(account) && cell.balance + *delta < Decimal::ZERO {
                return Err(LedgerError::InsufficientFunds);
            }
        }

        let now = Utc::now();
        for (cell, delta) in locked.iter_mut().zip(deltas.iter()) {
            cell.balance += *delta;
            cell.last_updated = now;
        }
        Ok(())
    }

    /// A consistent snapshot of every account balance.
    ///
    /// All cells are locked (canonical order) before any is read, so the
    /// snapshot never straddles a concurrent application: the trial
    /// balance of the result is always exactly zero.
    pub fn snapshot(&self) -> Vec<(Account, Decimal)> {
        let locked: Vec<MutexGuard<'_, BalanceCell>> =
            self.cells.iter().map(|cell| cell.lock()).collect();
        Account::ALL
            .iter()
            .zip(locked.iter())
            .map(|(account, cell)| (*account, cell.balance))
            .collect()
    }

    /// Sum of all account balances; zero whenever only balanced entries
    /// have been applied.
    pub fn trial_balance(&self) -> Decimal {
        self.snapshot().into_iter().map(|(_, balance)| balance).sum()
    }
}

impl Default for BalanceLedger {
    fn default() -> Self {
        Self::new()
    }
}
