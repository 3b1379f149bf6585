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

//! Payment documents.
//!
//! Payments follow a state machine:
//! - [`Pending`] → [`Processing`] (accepted for work)
//! - [`Processing`] → [`Completed`] or [`Failed`]
//! - [`Completed`] → [`Nsf`] (funds did not clear; one-way)
//!
//! [`Failed`] and [`Nsf`] are terminal.
//!
//! [`Pending`]: PaymentStatus::Pending
//! [`Processing`]: PaymentStatus::Processing
//! [`Completed`]: PaymentStatus::Completed
//! [`Failed`]: PaymentStatus::Failed
//! [`Nsf`]: PaymentStatus::Nsf

use crate::account::Account;
use crate::base::{LeaseId, PaymentId, PropertyId, TenantId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Nsf,
}

/// How the tenant paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Check,
    Ach,
    Card,
    Cash,
    MoneyOrder,
}

impl PaymentMethod {
    /// The asset account the funds land in.
    pub fn funds_account(&self) -> Account {
        match self {
            PaymentMethod::Cash => Account::Cash,
            _ => Account::OperatingBank,
        }
    }

    /// Parses a method from its snake_case name.
    pub fn parse(name: &str) -> Option<PaymentMethod> {
        match name {
            "check" => Some(PaymentMethod::Check),
            "ach" => Some(PaymentMethod::Ach),
            "card" => Some(PaymentMethod::Card),
            "cash" => Some(PaymentMethod::Cash),
            "money_order" => Some(PaymentMethod::MoneyOrder),
            _ => None,
        }
    }
}

/// What a charge is for; selects the revenue account credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    Rent,
    LateFee,
    Utility,
}

impl ChargeKind {
    pub fn revenue_account(&self) -> Account {
        match self {
            ChargeKind::Rent => Account::RentRevenue,
            ChargeKind::LateFee => Account::LateFeeRevenue,
            ChargeKind::Utility => Account::UtilityRevenue,
        }
    }

    /// Parses a kind from its snake_case name.
    pub fn parse(name: &str) -> Option<ChargeKind> {
        match name {
            "rent" => Some(ChargeKind::Rent),
            "late_fee" => Some(ChargeKind::LateFee),
            "utility" => Some(ChargeKind::Utility),
            _ => None,
        }
    }
}

/// A tenant payment document.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    pub lease_id: LeaseId,
    pub property_id: PropertyId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Caller-supplied reference, the idempotency key for API payments.
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(
        id: PaymentId,
        tenant_id: TenantId,
        lease_id: LeaseId,
        property_id: PropertyId,
        amount: Decimal,
        method: PaymentMethod,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            lease_id,
            property_id,
            amount,
            method,
            status: PaymentStatus::Pending,
            reference: reference.into(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    fn transition(&mut self, to: PaymentStatus) -> Result<(), LedgerError> {
        use PaymentStatus::*;
        let allowed = matches!(
            (self.status, to),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed) | (Completed, Nsf)
        );
        if !allowed {
            return Err(LedgerError::InvalidState { from: self.status });
        }
        self.status = to;
        Ok(())
    }

    /// `Pending` → `Processing`.
    pub fn begin_processing(&mut self) -> Result<(), LedgerError> {
        self.transition(PaymentStatus::Processing)
    }

    /// `Processing` → `Completed`; stamps `processed_at`.
    pub fn complete(&mut self) -> Result<(), LedgerError> {
        self.transition(PaymentStatus::Completed)?;
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    /// `Processing` → `Failed`.
    pub fn fail(&mut self) -> Result<(), LedgerError> {
        self.transition(PaymentStatus::Failed)
    }

    /// `Completed` → `Nsf`.
    pub fn mark_nsf(&mut self) -> Result<(), LedgerError> {
        self.transition(PaymentStatus::Nsf)
    }
}
