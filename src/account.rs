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

//! Chart of accounts.
//!
//! Accounts are a fixed, process-lifetime set. Every balance starts at
//! zero and is only ever moved by journal posting application.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed chart of accounts.
///
/// Sign convention, applied uniformly: a debit is a positive signed
/// amount, a credit is negative, regardless of account kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Account {
    Cash,
    OperatingBank,
    AccountsReceivable,
    UnearnedRevenue,
    RentRevenue,
    LateFeeRevenue,
    UtilityRevenue,
    TrustDeposit,
    OwnerPayable,
}

/// Reporting classification of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Asset,
    Liability,
    Revenue,
}

impl Account {
    /// All accounts, in canonical lock-acquisition order.
    pub const ALL: [Account; 9] = [
        Account::Cash,
        Account::OperatingBank,
        Account::AccountsReceivable,
        Account::UnearnedRevenue,
        Account::RentRevenue,
        Account::LateFeeRevenue,
        Account::UtilityRevenue,
        Account::TrustDeposit,
        Account::OwnerPayable,
    ];

    pub fn kind(&self) -> AccountKind {
        match self {
            Account::Cash | Account::OperatingBank | Account::AccountsReceivable => {
                AccountKind::Asset
            }
            Account::UnearnedRevenue | Account::TrustDeposit | Account::OwnerPayable => {
                AccountKind::Liability
            }
            Account::RentRevenue | Account::LateFeeRevenue | Account::UtilityRevenue => {
                AccountKind::Revenue
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Account::Cash => "cash",
            Account::OperatingBank => "operating_bank",
            Account::AccountsReceivable => "accounts_receivable",
            Account::UnearnedRevenue => "unearned_revenue",
            Account::RentRevenue => "rent_revenue",
            Account::LateFeeRevenue => "late_fee_revenue",
            Account::UtilityRevenue => "utility_revenue",
            Account::TrustDeposit => "trust_deposit",
            Account::OwnerPayable => "owner_payable",
        }
    }

    /// Parses an account from its snake_case name.
    ///
    /// Returns `None` for unknown names; callers treat unknown accounts
    /// as zero-balance rather than as an error.
    pub fn from_name(name: &str) -> Option<Account> {
        Account::ALL.iter().copied().find(|a| a.name() == name)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for account in Account::ALL {
            assert_eq!(Account::from_name(account.name()), Some(account));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(Account::from_name("petty_cash"), None);
    }

    #[test]
    fn kinds_cover_the_chart() {
        assert_eq!(Account::Cash.kind(), AccountKind::Asset);
        assert_eq!(Account::AccountsReceivable.kind(), AccountKind::Asset);
        assert_eq!(Account::TrustDeposit.kind(), AccountKind::Liability);
        assert_eq!(Account::OwnerPayable.kind(), AccountKind::Liability);
        assert_eq!(Account::RentRevenue.kind(), AccountKind::Revenue);
        assert_eq!(Account::LateFeeRevenue.kind(), AccountKind::Revenue);
    }

    #[test]
    fn all_is_sorted_in_lock_order() {
        let mut sorted = Account::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Account::ALL.to_vec());
    }
}
