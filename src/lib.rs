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

//! # Rent Ledger
//!
//! This library is the payment-to-ledger accounting core of a property
//! management system: it turns tenant charges and payments into durable,
//! auditable financial state — double-entry journal postings, per-account
//! balances, a per-tenant running ledger and an AR aging schedule — while
//! guaranteeing that concurrent, retried or duplicated requests never
//! corrupt money.
//!
//! ## Core Components
//!
//! - [`PaymentEngine`]: façade processing charges, payments, NSF
//!   reversals and owner distributions
//! - [`Journal`]: balanced, append-only double-entry journal
//! - [`BalanceLedger`]: lock-protected per-account balances
//! - [`ArAging`]: per-tenant receivable aging with oldest-first payment
//!   application
//! - [`IdempotencyStore`]: at-most-once execution per caller key
//! - [`SequenceGenerator`]: gapless check/receipt numbering
//! - [`LedgerError`]: error taxonomy separating validation, state,
//!   contention and invariant failures
//!
//! ## Example
//!
//! ```
//! use rent_ledger_rs::{ChargeKind, LeaseId, PaymentEngine, PaymentMethod, PropertyId, TenantId};
//! use chrono::Utc;
//! use rust_decimal_macros::dec;
//!
//! let engine = PaymentEngine::new();
//! let today = Utc::now().date_naive();
//!
//! // Charge August rent
//! engine
//!     .create_charge(
//!         TenantId(1),
//!         LeaseId(1),
//!         PropertyId(1),
//!         dec!(1500.00),
//!         ChargeKind::Rent,
//!         "August rent",
//!         today,
//!     )
//!     .unwrap();
//!
//! // Tenant pays by check; the key makes retries safe
//! let outcome = engine
//!     .process_payment(
//!         TenantId(1),
//!         LeaseId(1),
//!         PropertyId(1),
//!         dec!(1500.00),
//!         PaymentMethod::Check,
//!         "pay-2026-08-001",
//!     )
//!     .unwrap();
//! assert!(outcome.is_processed());
//! assert_eq!(engine.tenant_balance(TenantId(1)), dec!(0.00));
//! ```
//!
//! ## Thread Safety
//!
//! Every account, tenant, idempotency key and sequence is an independent
//! critical section; operations on unrelated keys run in parallel.

pub mod account;
pub mod aging;
mod allocation;
mod balance;
mod base;
mod engine;
pub mod error;
mod idempotency;
mod journal;
mod payment;
mod sequence;
mod tenant_ledger;
mod threshold;

pub use account::{Account, AccountKind};
pub use aging::{AgeBucket, AgingBuckets, ArAging, bucket_for};
pub use allocation::ClaimRegistry;
pub use balance::BalanceLedger;
pub use base::{EntryId, LeaseId, PaymentId, PostingId, PropertyId, TenantId, TraceId};
pub use engine::{NsfOutcome, PaymentEngine, PaymentOutcome, PaymentReceipt, TenantStatement};
pub use error::LedgerError;
pub use idempotency::{Idempotent, IdempotencyRecord, IdempotencyStore};
pub use journal::{
    EntryDraft, Journal, JournalEntry, JournalPosting, Posting, SourceKind, SourceRef,
};
pub use payment::{ChargeKind, Payment, PaymentMethod, PaymentStatus};
pub use sequence::SequenceGenerator;
pub use tenant_ledger::{TenantEntryKind, TenantLedger, TenantLedgerEntry};
pub use threshold::ThresholdPolicy;
