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

//! Error types for ledger operations.

use crate::payment::PaymentStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Ledger operation errors.
///
/// Only [`LedgerError::Contention`] is retryable; everything else is a
/// final answer for the request that produced it. Rejected operations
/// leave all ledger state unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or negative where a positive amount is required
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// A fee amount is negative
    #[error("invalid fee (must not be negative)")]
    InvalidFee,

    /// Referenced payment does not exist
    #[error("payment not found")]
    PaymentNotFound,

    /// Operation not permitted for the payment's current status
    #[error("payment is {from:?}, operation requires completed")]
    InvalidState {
        /// Status the payment was in when the operation was rejected.
        from: PaymentStatus,
    },

    /// Application would drive a guarded account balance negative
    #[error("insufficient funds in source account")]
    InsufficientFunds,

    /// Exclusive resource is already claimed by another holder
    #[error("resource '{resource}' is already claimed")]
    ResourceClaimed {
        /// Resource that lost the race.
        resource: String,
    },

    /// Claim release attempted by someone other than the holder
    #[error("resource '{resource}' is not held by this claimant")]
    NotClaimHolder {
        /// Resource whose release was rejected.
        resource: String,
    },

    /// Lock not acquired within the bounded wait; safe to retry with backoff
    #[error("operation '{key}' is in flight elsewhere, try again")]
    Contention {
        /// Idempotency key that timed out.
        key: String,
    },

    /// Journal entry postings do not sum to zero
    ///
    /// Indicates a programming defect in entry construction, never a user
    /// error; it is reported loudly and the entry is discarded.
    #[error("unbalanced journal entry: postings sum to {sum}, expected 0")]
    UnbalancedEntry {
        /// Actual signed sum of the rejected postings.
        sum: Decimal,
    },

    /// Journal entry has no postings
    #[error("journal entry has no postings")]
    EmptyEntry,
}

impl LedgerError {
    /// True when the caller may retry the same request after backing off.
    ///
    /// Validation and invariant errors will fail identically on retry and
    /// are therefore not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Contention { .. })
    }
}
