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

//! Payment processing engine.
//!
//! The [`PaymentEngine`] is the façade over the accounting core. It
//! accepts charge, payment and NSF requests, drives the journal, balance
//! ledger, AR aging and tenant ledger, and returns results with an audit
//! trail (trace id plus linked journal entry).
//!
//! # Request Processing
//!
//! - **Charges**: debit AR, credit the revenue account for the charge
//!   kind, age the receivable from its due date.
//! - **Payments**: idempotent by caller key; debit cash/bank, credit AR,
//!   apply to aging oldest-bucket-first.
//! - **NSF**: reverse a completed payment, re-age the receivable dated
//!   today, optionally charge a fee.
//! - **Distributions**: pay owners out of the bank, never below zero.
//!
//! # Invariants
//!
//! - Every stored journal entry is balanced (sum of postings is zero).
//! - For one idempotency key, at most one payment is settled; duplicate
//!   callers observe the first result.
//! - Validation failures reject before any state is touched.
//!
//! # Thread Safety
//!
//! All state is keyed per account, tenant, payment, sequence or
//! idempotency key; operations on unrelated keys never contend.

use crate::account::Account;
use crate::aging::{AgingBuckets, ArAging};
use crate::balance::BalanceLedger;
use crate::base::{EntryId, LeaseId, PaymentId, PropertyId, TenantId, TraceId};
use crate::error::LedgerError;
use crate::idempotency::{Idempotent, IdempotencyStore};
use crate::journal::{EntryDraft, Journal, JournalEntry, Posting, SourceKind, SourceRef};
use crate::payment::{ChargeKind, Payment, PaymentMethod};
use crate::sequence::SequenceGenerator;
use crate::allocation::ClaimRegistry;
use crate::tenant_ledger::{TenantEntryKind, TenantLedger, TenantLedgerEntry};
use crate::threshold::ThresholdPolicy;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Result of a settled payment, kept as the idempotency record.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    /// Snapshot of the payment at completion.
    pub payment: Payment,
    /// Journal entry the settlement produced.
    pub entry_id: EntryId,
    pub trace_id: TraceId,
}

/// Whether this caller settled the payment or observed a duplicate.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// This request executed the settlement.
    Processed(PaymentReceipt),
    /// An earlier request with the same key already settled it; this is
    /// that request's receipt.
    AlreadyProcessed(PaymentReceipt),
}

impl PaymentOutcome {
    pub fn receipt(&self) -> &PaymentReceipt {
        match self {
            PaymentOutcome::Processed(receipt) | PaymentOutcome::AlreadyProcessed(receipt) => {
                receipt
            }
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, PaymentOutcome::Processed(_))
    }
}

/// Result of an NSF reversal.
#[derive(Debug, Clone)]
pub struct NsfOutcome {
    /// The reversal entry (re-debits AR, re-credits the funds account).
    pub reversal: Arc<JournalEntry>,
    /// The fee charge entry, when a positive fee was assessed.
    pub fee: Option<Arc<JournalEntry>>,
}

/// Per-tenant statement line: running balance plus aging buckets.
#[derive(Debug, Clone)]
pub struct TenantStatement {
    pub tenant_id: TenantId,
    pub balance: Decimal,
    pub buckets: AgingBuckets,
}

impl Serialize for TenantStatement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TenantStatement", 8)?;
        state.serialize_field("tenant", &self.tenant_id)?;
        state.serialize_field("balance", &self.balance.round_dp(PaymentEngine::MONEY_PRECISION))?;
        state.serialize_field(
            "current",
            &self.buckets.current.round_dp(PaymentEngine::MONEY_PRECISION),
        )?;
        state.serialize_field(
            "days_30",
            &self.buckets.days_30.round_dp(PaymentEngine::MONEY_PRECISION),
        )?;
        state.serialize_field(
            "days_60",
            &self.buckets.days_60.round_dp(PaymentEngine::MONEY_PRECISION),
        )?;
        state.serialize_field(
            "days_90",
            &self.buckets.days_90.round_dp(PaymentEngine::MONEY_PRECISION),
        )?;
        state.serialize_field(
            "days_90_plus",
            &self.buckets.days_90_plus.round_dp(PaymentEngine::MONEY_PRECISION),
        )?;
        state.serialize_field(
            "total",
            &self.buckets.total.round_dp(PaymentEngine::MONEY_PRECISION),
        )?;
        state.end()
    }
}

/// Payment processing engine managing the accounting core.
pub struct PaymentEngine {
    balances: BalanceLedger,
    journal: Journal,
    aging: ArAging,
    tenant_ledger: TenantLedger,
    payments: DashMap<PaymentId, Payment>,
    idempotency: IdempotencyStore<PaymentReceipt>,
    sequences: SequenceGenerator,
    claims: ClaimRegistry,
    thresholds: ThresholdPolicy,
    next_payment_id: AtomicU64,
    next_document_id: AtomicU64,
    lock_wait: Duration,
}

impl PaymentEngine {
    const MONEY_PRECISION: u32 = 2;

    /// Bounded wait for a key held by a concurrent duplicate request.
    pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(250);

    /// Creates an engine with zeroed balances and no history.
    pub fn new() -> Self {
        Self::with_lock_wait(Self::DEFAULT_LOCK_WAIT)
    }

    /// Creates an engine with a custom idempotency-key wait bound.
    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            balances: BalanceLedger::new(),
            journal: Journal::new(),
            aging: ArAging::new(),
            tenant_ledger: TenantLedger::new(),
            payments: DashMap::new(),
            idempotency: IdempotencyStore::new(),
            sequences: SequenceGenerator::new(),
            claims: ClaimRegistry::new(),
            thresholds: ThresholdPolicy::new(),
            next_payment_id: AtomicU64::new(0),
            next_document_id: AtomicU64::new(0),
            lock_wait,
        }
    }

    fn next_document_id(&self) -> u64 {
        self.next_document_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Creates a charge against a tenant.
    ///
    /// Debits AR, credits the revenue account selected by `kind`,
    /// appends a `charge` tenant-ledger entry and ages the receivable
    /// from `due_date`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] - `amount` is zero or negative;
    /// nothing is recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn create_charge(
        &self,
        tenant_id: TenantId,
        lease_id: LeaseId,
        property_id: PropertyId,
        amount: Decimal,
        kind: ChargeKind,
        description: &str,
        due_date: NaiveDate,
    ) -> Result<Arc<JournalEntry>, LedgerError> {
        self.charge_with_trace(
            tenant_id,
            lease_id,
            property_id,
            amount,
            kind,
            description,
            due_date,
            TraceId::new(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn charge_with_trace(
        &self,
        tenant_id: TenantId,
        lease_id: LeaseId,
        property_id: PropertyId,
        amount: Decimal,
        kind: ChargeKind,
        description: &str,
        due_date: NaiveDate,
        trace_id: TraceId,
    ) -> Result<Arc<JournalEntry>, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let charge_id = self.next_document_id();
        let today = Utc::now().date_naive();
        let entry = self.journal.post(
            EntryDraft {
                description: description.to_string(),
                source: SourceRef {
                    kind: SourceKind::Charge,
                    id: charge_id,
                },
                trace_id,
                postings: vec![
                    Posting::for_tenant(
                        Account::AccountsReceivable,
                        amount,
                        tenant_id,
                        property_id,
                    ),
                    Posting::for_tenant(kind.revenue_account(), -amount, tenant_id, property_id),
                ],
            },
            &self.balances,
        )?;

        self.tenant_ledger.append(
            tenant_id,
            TenantEntryKind::Charge,
            amount,
            description,
            today,
        );
        self.aging.add_charge(tenant_id, amount, due_date, today);

        info!(
            trace = %trace_id,
            tenant = %tenant_id,
            lease = %lease_id,
            entry = %entry.id,
            %amount,
            "charge created"
        );
        Ok(entry)
    }

    /// Processes a tenant payment, idempotent by `idempotency_key`.
    ///
    /// Exactly one of any number of concurrent callers sharing a key
    /// settles the payment; the rest receive
    /// [`PaymentOutcome::AlreadyProcessed`] with the winner's receipt.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative;
    ///   rejected before the idempotency store is touched.
    /// - [`LedgerError::Contention`] - the key was held past the bounded
    ///   wait; the caller may retry.
    pub fn process_payment(
        &self,
        tenant_id: TenantId,
        lease_id: LeaseId,
        property_id: PropertyId,
        amount: Decimal,
        method: PaymentMethod,
        idempotency_key: &str,
    ) -> Result<PaymentOutcome, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let outcome = self
            .idempotency
            .execute(idempotency_key, self.lock_wait, || {
                self.settle_payment(
                    tenant_id,
                    lease_id,
                    property_id,
                    amount,
                    method,
                    idempotency_key,
                )
            })
            .inspect_err(|error| {
                if error.is_retryable() {
                    warn!(key = idempotency_key, "payment key contended, not settled");
                }
            })?;

        Ok(match outcome {
            Idempotent::Fresh(receipt) => PaymentOutcome::Processed(receipt),
            Idempotent::Replayed(receipt) => PaymentOutcome::AlreadyProcessed(receipt),
        })
    }

    /// Settles one payment. Runs at most once per idempotency key.
    fn settle_payment(
        &self,
        tenant_id: TenantId,
        lease_id: LeaseId,
        property_id: PropertyId,
        amount: Decimal,
        method: PaymentMethod,
        idempotency_key: &str,
    ) -> Result<PaymentReceipt, LedgerError> {
        let payment_id = PaymentId(self.next_payment_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut payment = Payment::new(
            payment_id,
            tenant_id,
            lease_id,
            property_id,
            amount,
            method,
            idempotency_key,
        );
        payment.begin_processing()?;

        let trace_id = TraceId::new();
        let description = format!("payment {} from tenant {}", payment_id, tenant_id);
        let entry = self.journal.post(
            EntryDraft {
                description: description.clone(),
                source: SourceRef {
                    kind: SourceKind::Payment,
                    id: payment_id.0,
                },
                trace_id,
                postings: vec![
                    Posting::for_tenant(method.funds_account(), amount, tenant_id, property_id),
                    Posting::for_tenant(
                        Account::AccountsReceivable,
                        -amount,
                        tenant_id,
                        property_id,
                    ),
                ],
            },
            &self.balances,
        )?;

        let today = Utc::now().date_naive();
        self.tenant_ledger.append(
            tenant_id,
            TenantEntryKind::Payment,
            -amount,
            &description,
            today,
        );
        self.aging.apply_payment(tenant_id, amount);

        payment.complete()?;
        self.payments.insert(payment_id, payment.clone());

        info!(
            trace = %trace_id,
            tenant = %tenant_id,
            payment = %payment_id,
            entry = %entry.id,
            %amount,
            "payment completed"
        );
        Ok(PaymentReceipt {
            payment,
            entry_id: entry.id,
            trace_id,
        })
    }

    /// Reverses a completed payment whose funds did not clear.
    ///
    /// Re-debits AR and re-credits the original funds account, re-ages
    /// the receivable dated today (never backdated), and charges
    /// `nsf_fee` as a late fee when positive. Both entries share one
    /// trace id.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidFee`] - `nsf_fee` is negative.
    /// - [`LedgerError::PaymentNotFound`] - unknown payment id.
    /// - [`LedgerError::InvalidState`] - the payment is not `Completed`.
    pub fn process_nsf(
        &self,
        payment_id: PaymentId,
        nsf_fee: Decimal,
    ) -> Result<NsfOutcome, LedgerError> {
        if nsf_fee < Decimal::ZERO {
            return Err(LedgerError::InvalidFee);
        }

        let (tenant_id, lease_id, property_id, amount, method) = {
            let mut payment = self
                .payments
                .get_mut(&payment_id)
                .ok_or(LedgerError::PaymentNotFound)?;
            payment.mark_nsf()?;
            (
                payment.tenant_id,
                payment.lease_id,
                payment.property_id,
                payment.amount,
                payment.method,
            )
        };

        let trace_id = TraceId::new();
        let today = Utc::now().date_naive();
        let description = format!("NSF reversal of payment {}", payment_id);
        let reversal = self.journal.post(
            EntryDraft {
                description: description.clone(),
                source: SourceRef {
                    kind: SourceKind::NsfReversal,
                    id: payment_id.0,
                },
                trace_id,
                postings: vec![
                    Posting::for_tenant(
                        Account::AccountsReceivable,
                        amount,
                        tenant_id,
                        property_id,
                    ),
                    Posting::for_tenant(method.funds_account(), -amount, tenant_id, property_id),
                ],
            },
            &self.balances,
        )?;

        self.tenant_ledger.append(
            tenant_id,
            TenantEntryKind::Adjustment,
            amount,
            &description,
            today,
        );
        // The reversed receivable is due now, not at the original date.
        self.aging.add_charge(tenant_id, amount, today, today);

        let fee = if nsf_fee > Decimal::ZERO {
            Some(self.charge_with_trace(
                tenant_id,
                lease_id,
                property_id,
                nsf_fee,
                ChargeKind::LateFee,
                &format!("NSF fee for payment {}", payment_id),
                today,
                trace_id,
            )?)
        } else {
            None
        };

        info!(
            trace = %trace_id,
            payment = %payment_id,
            %amount,
            fee = %nsf_fee,
            "payment reversed for NSF"
        );
        Ok(NsfOutcome { reversal, fee })
    }

    /// Pays an owner out of the operating bank.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`LedgerError::InsufficientFunds`] - the bank balance cannot
    ///   cover the distribution; under concurrent distributions of the
    ///   last funds, exactly the requests that fit succeed.
    pub fn record_distribution(
        &self,
        property_id: PropertyId,
        amount: Decimal,
    ) -> Result<Arc<JournalEntry>, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let document_id = self.next_document_id();
        let trace_id = TraceId::new();
        let entry = self.journal.post_guarded(
            EntryDraft {
                description: format!("owner distribution for property {}", property_id),
                source: SourceRef {
                    kind: SourceKind::OwnerDistribution,
                    id: document_id,
                },
                trace_id,
                postings: vec![
                    Posting {
                        account: Account::OwnerPayable,
                        amount,
                        tenant_id: None,
                        property_id: Some(property_id),
                    },
                    Posting {
                        account: Account::OperatingBank,
                        amount: -amount,
                        tenant_id: None,
                        property_id: Some(property_id),
                    },
                ],
            },
            &self.balances,
            &[Account::OperatingBank],
        )?;

        info!(trace = %trace_id, property = %property_id, %amount, "owner distribution recorded");
        Ok(entry)
    }

    // === Queries ===

    /// Current balance of one account; accounts never posted to are zero.
    pub fn account_balance(&self, account: Account) -> Decimal {
        self.balances.balance(account)
    }

    /// Balance lookup by account name; unknown names report zero rather
    /// than an error.
    pub fn account_balance_by_name(&self, name: &str) -> Decimal {
        match Account::from_name(name) {
            Some(account) => self.balances.balance(account),
            None => Decimal::ZERO,
        }
    }

    /// Consistent snapshot of all account balances.
    pub fn balance_snapshot(&self) -> Vec<(Account, Decimal)> {
        self.balances.snapshot()
    }

    /// Sum of all account balances; zero unless the journal has been
    /// corrupted.
    pub fn trial_balance(&self) -> Decimal {
        self.balances.trial_balance()
    }

    /// Current running balance of a tenant; zero with no history.
    pub fn tenant_balance(&self, tenant_id: TenantId) -> Decimal {
        self.tenant_ledger.balance(tenant_id)
    }

    /// Full tenant ledger history, oldest first.
    pub fn tenant_history(&self, tenant_id: TenantId) -> Vec<TenantLedgerEntry> {
        self.tenant_ledger.entries(tenant_id)
    }

    /// AR aging buckets for a tenant; all-zero with no data.
    pub fn ar_aging(&self, tenant_id: TenantId) -> AgingBuckets {
        self.aging.buckets(tenant_id)
    }

    /// Statement line for one tenant.
    pub fn statement(&self, tenant_id: TenantId) -> TenantStatement {
        TenantStatement {
            tenant_id,
            balance: self.tenant_balance(tenant_id),
            buckets: self.ar_aging(tenant_id),
        }
    }

    /// All tenants with ledger history, in id order.
    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenant_ledger.tenant_ids()
    }

    /// A payment document by id.
    pub fn payment(&self, payment_id: PaymentId) -> Option<Payment> {
        self.payments.get(&payment_id).map(|p| p.clone())
    }

    /// A stored journal entry by id.
    pub fn journal_entry(&self, entry_id: EntryId) -> Option<Arc<JournalEntry>> {
        self.journal.get(entry_id)
    }

    /// Audit lookup: all entries produced from one source document.
    pub fn entries_for_source(&self, source: SourceRef) -> Vec<Arc<JournalEntry>> {
        self.journal.entries_for_source(source)
    }

    /// Audit lookup: all entries correlated to one trace id.
    pub fn entries_for_trace(&self, trace_id: TraceId) -> Vec<Arc<JournalEntry>> {
        self.journal.entries_for_trace(trace_id)
    }

    /// Ids of stored entries whose postings do not sum to zero; empty in
    /// a healthy ledger.
    pub fn validate_double_entry(&self) -> Vec<EntryId> {
        self.journal.unbalanced_entries()
    }

    /// Seeds a named sequence so the next number is `start + 1`.
    pub fn register_sequence(&self, name: &str, start: u64) {
        self.sequences.register(name, start);
    }

    /// Issues the next gapless number of a named sequence.
    pub fn next_number(&self, name: &str) -> u64 {
        self.sequences.next(name)
    }

    /// Claims an exclusive resource (e.g. a rental unit) for a tenant.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ResourceClaimed`] when another claim won the race.
    pub fn claim_unit(&self, unit: &str, tenant_id: TenantId) -> Result<(), LedgerError> {
        self.claims.claim(unit, &tenant_id.to_string())
    }

    /// Releases a unit previously claimed by this tenant.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotClaimHolder`] when the unit is not held by this
    /// tenant.
    pub fn release_unit(&self, unit: &str, tenant_id: TenantId) -> Result<(), LedgerError> {
        self.claims.release(unit, &tenant_id.to_string())
    }

    /// Approval threshold configuration (property override →
    /// organization-wide → built-in default).
    pub fn thresholds(&self) -> &ThresholdPolicy {
        &self.thresholds
    }

    /// Whether a payment of this size needs manual review for this
    /// property.
    pub fn requires_approval(&self, property_id: PropertyId, amount: Decimal) -> bool {
        self.thresholds.requires_approval(property_id, amount)
    }
}

impl Default for PaymentEngine {
    fn default() -> Self {
        Self::new()
    }
}
