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

//! Double-entry journal engine.
//!
//! The [`Journal`] turns drafts built from business events into stored,
//! immutable [`JournalEntry`] values. An entry is accepted only if its
//! postings sum to exactly zero; an unbalanced draft is a construction
//! defect and is rejected outright, never retried and never corrected.
//!
//! Accepted entries are applied to the [`BalanceLedger`] and then logged
//! append-only. Every entry carries a [`TraceId`] correlating it to the
//! originating business event and a [`SourceRef`] for audit lookup.

use crate::account::Account;
use crate::balance::BalanceLedger;
use crate::base::{EntryId, PostingId, PropertyId, TenantId, TraceId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of source document a journal entry was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Charge,
    Payment,
    NsfReversal,
    OwnerDistribution,
}

/// Reference to the source document that produced a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub id: u64,
}

/// A draft posting: one signed account movement, before ids are assigned.
///
/// A debit is positive, a credit is negative.
#[derive(Debug, Clone)]
pub struct Posting {
    pub account: Account,
    pub amount: Decimal,
    pub tenant_id: Option<TenantId>,
    pub property_id: Option<PropertyId>,
}

impl Posting {
    pub fn new(account: Account, amount: Decimal) -> Self {
        Self {
            account,
            amount,
            tenant_id: None,
            property_id: None,
        }
    }

    pub fn for_tenant(
        account: Account,
        amount: Decimal,
        tenant_id: TenantId,
        property_id: PropertyId,
    ) -> Self {
        Self {
            account,
            amount,
            tenant_id: Some(tenant_id),
            property_id: Some(property_id),
        }
    }
}

/// A journal entry draft, ready to be posted.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub description: String,
    pub source: SourceRef,
    pub trace_id: TraceId,
    pub postings: Vec<Posting>,
}

/// A stored posting belonging to exactly one journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct JournalPosting {
    pub id: PostingId,
    pub entry_id: EntryId,
    pub account: Account,
    pub amount: Decimal,
    pub tenant_id: Option<TenantId>,
    pub property_id: Option<PropertyId>,
}

/// An immutable, balanced journal entry.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: EntryId,
    pub description: String,
    pub postings: Vec<JournalPosting>,
    pub source: SourceRef,
    pub trace_id: TraceId,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Signed sum of all postings; zero for every accepted entry.
    pub fn posting_sum(&self) -> Decimal {
        self.postings.iter().map(|p| p.amount).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.posting_sum() == Decimal::ZERO
    }
}

/// Append-only journal entry log.
///
/// Combines a [`DashMap`] for O(1) entry lookup with a [`SegQueue`]
/// preserving insertion order. Entries are immutable once stored.
#[derive(Debug)]
pub struct Journal {
    /// Entries indexed by id.
    entries: DashMap<EntryId, Arc<JournalEntry>>,
    /// Entry ids in the order they were accepted.
    entry_order: SegQueue<EntryId>,
    next_entry_id: AtomicU64,
    next_posting_id: AtomicU64,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            entry_order: SegQueue::new(),
            next_entry_id: AtomicU64::new(0),
            next_posting_id: AtomicU64::new(0),
        }
    }

    /// Validates a draft, applies it to the balance ledger and stores it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EmptyEntry`] - the draft has no postings.
    /// - [`LedgerError::UnbalancedEntry`] - the postings do not sum to
    ///   exactly zero. Nothing is stored or applied.
    pub fn post(
        &self,
        draft: EntryDraft,
        balances: &BalanceLedger,
    ) -> Result<Arc<JournalEntry>, LedgerError> {
        self.post_guarded(draft, balances, &[])
    }

    /// Like [`Journal::post`], but the application is rejected (and the
    /// entry discarded) if it would drive any account in `guards`
    /// negative.
    ///
    /// # Errors
    ///
    /// In addition to [`Journal::post`] errors,
    /// [`LedgerError::InsufficientFunds`] when a guarded account would go
    /// negative.
    pub fn post_guarded(
        &self,
        draft: EntryDraft,
        balances: &BalanceLedger,
        guards: &[Account],
    ) -> Result<Arc<JournalEntry>, LedgerError> {
        if draft.postings.is_empty() {
            return Err(LedgerError::EmptyEntry);
        }
        let sum: Decimal = draft.postings.iter().map(|p| p.amount).sum();
        if sum != Decimal::ZERO {
            return Err(LedgerError::UnbalancedEntry { sum });
        }

        let entry_id = EntryId(self.next_entry_id.fetch_add(1, Ordering::SeqCst) + 1);
        let postings: Vec<JournalPosting> = draft
            .postings
            .into_iter()
            .map(|p| JournalPosting {
                id: PostingId(self.next_posting_id.fetch_add(1, Ordering::SeqCst) + 1),
                entry_id,
                account: p.account,
                amount: p.amount,
                tenant_id: p.tenant_id,
                property_id: p.property_id,
            })
            .collect();

        balances.apply_guarded(&postings, guards)?;

        let entry = Arc::new(JournalEntry {
            id: entry_id,
            description: draft.description,
            postings,
            source: draft.source,
            trace_id: draft.trace_id,
            created_at: Utc::now(),
        });
        self.entries.insert(entry_id, Arc::clone(&entry));
        self.entry_order.push(entry_id);
        Ok(entry)
    }

    /// Retrieves a stored entry by id.
    pub fn get(&self, id: EntryId) -> Option<Arc<JournalEntry>> {
        self.entries.get(&id).map(|e| Arc::clone(&e))
    }

    /// All entries produced from one source document, oldest first.
    pub fn entries_for_source(&self, source: SourceRef) -> Vec<Arc<JournalEntry>> {
        let mut found: Vec<Arc<JournalEntry>> = self
            .entries
            .iter()
            .filter(|e| e.source == source)
            .map(|e| Arc::clone(e.value()))
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    /// All entries correlated to one trace id, oldest first.
    pub fn entries_for_trace(&self, trace_id: TraceId) -> Vec<Arc<JournalEntry>> {
        let mut found: Vec<Arc<JournalEntry>> = self
            .entries
            .iter()
            .filter(|e| e.trace_id == trace_id)
            .map(|e| Arc::clone(e.value()))
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    /// Ids of stored entries whose postings do not sum to zero.
    ///
    /// Always empty given that unbalanced drafts are rejected at post
    /// time; exposed as the audit surface that proves it.
    pub fn unbalanced_entries(&self) -> Vec<EntryId> {
        let mut bad: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|e| !e.is_balanced())
            .map(|e| e.id)
            .collect();
        bad.sort();
        bad
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(postings: Vec<Posting>) -> EntryDraft {
        EntryDraft {
            description: "test entry".to_string(),
            source: SourceRef {
                kind: SourceKind::Charge,
                id: 1,
            },
            trace_id: TraceId::new(),
            postings,
        }
    }

    #[test]
    fn balanced_entry_is_stored_and_applied() {
        let journal = Journal::new();
        let balances = BalanceLedger::new();

        let entry = journal
            .post(
                draft(vec![
                    Posting::new(Account::AccountsReceivable, dec!(100.00)),
                    Posting::new(Account::RentRevenue, dec!(-100.00)),
                ]),
                &balances,
            )
            .unwrap();

        assert!(entry.is_balanced());
        assert_eq!(journal.len(), 1);
        assert_eq!(balances.balance(Account::AccountsReceivable), dec!(100.00));
        assert_eq!(journal.get(entry.id).unwrap().id, entry.id);
    }

    #[test]
    fn unbalanced_entry_is_rejected_loudly() {
        let journal = Journal::new();
        let balances = BalanceLedger::new();

        let result = journal.post(
            draft(vec![
                Posting::new(Account::AccountsReceivable, dec!(100.00)),
                Posting::new(Account::RentRevenue, dec!(-99.99)),
            ]),
            &balances,
        );

        assert_eq!(
            result.unwrap_err(),
            LedgerError::UnbalancedEntry { sum: dec!(0.01) }
        );
        assert!(journal.is_empty());
        assert_eq!(balances.balance(Account::AccountsReceivable), Decimal::ZERO);
    }

    #[test]
    fn empty_entry_is_rejected() {
        let journal = Journal::new();
        let balances = BalanceLedger::new();
        assert_eq!(
            journal.post(draft(vec![]), &balances).unwrap_err(),
            LedgerError::EmptyEntry
        );
    }

    #[test]
    fn entry_ids_are_assigned_in_order() {
        let journal = Journal::new();
        let balances = BalanceLedger::new();

        for _ in 0..3 {
            journal
                .post(
                    draft(vec![
                        Posting::new(Account::Cash, dec!(1.00)),
                        Posting::new(Account::RentRevenue, dec!(-1.00)),
                    ]),
                    &balances,
                )
                .unwrap();
        }
        assert_eq!(journal.len(), 3);
        assert_eq!(journal.get(EntryId(3)).unwrap().id, EntryId(3));
    }

    #[test]
    fn source_lookup_finds_all_linked_entries() {
        let journal = Journal::new();
        let balances = BalanceLedger::new();
        let source = SourceRef {
            kind: SourceKind::Payment,
            id: 42,
        };

        for _ in 0..2 {
            journal
                .post(
                    EntryDraft {
                        description: "payment".to_string(),
                        source,
                        trace_id: TraceId::new(),
                        postings: vec![
                            Posting::new(Account::OperatingBank, dec!(10.00)),
                            Posting::new(Account::AccountsReceivable, dec!(-10.00)),
                        ],
                    },
                    &balances,
                )
                .unwrap();
        }

        let linked = journal.entries_for_source(source);
        assert_eq!(linked.len(), 2);
        assert!(linked[0].id < linked[1].id);
    }

    #[test]
    fn validate_reports_no_unbalanced_entries() {
        let journal = Journal::new();
        let balances = BalanceLedger::new();
        journal
            .post(
                draft(vec![
                    Posting::new(Account::Cash, dec!(5.00)),
                    Posting::new(Account::LateFeeRevenue, dec!(-5.00)),
                ]),
                &balances,
            )
            .unwrap();
        assert!(journal.unbalanced_entries().is_empty());
    }
}
