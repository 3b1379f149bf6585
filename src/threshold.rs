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

//! Approval thresholds.
//!
//! Payments at or above a threshold are flagged for manual review.
//! Resolution is an explicit three-tier lookup returning the first
//! match: property-specific override, then the organization-wide
//! setting, then the built-in default.

use crate::base::PropertyId;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Built-in review threshold used when nothing is configured.
const DEFAULT_THRESHOLD: Decimal = dec!(10000.00);

/// Three-tier approval threshold policy.
#[derive(Debug)]
pub struct ThresholdPolicy {
    property_overrides: DashMap<PropertyId, Decimal>,
    organization: Mutex<Option<Decimal>>,
}

impl ThresholdPolicy {
    pub fn new() -> Self {
        Self {
            property_overrides: DashMap::new(),
            organization: Mutex::new(None),
        }
    }

    /// Sets a property-specific threshold (highest precedence).
    pub fn set_property(&self, property_id: PropertyId, threshold: Decimal) {
        self.property_overrides.insert(property_id, threshold);
    }

    /// Clears a property-specific threshold.
    pub fn clear_property(&self, property_id: PropertyId) {
        self.property_overrides.remove(&property_id);
    }

    /// Sets the organization-wide threshold (middle precedence).
    pub fn set_organization(&self, threshold: Decimal) {
        *self.organization.lock() = Some(threshold);
    }

    /// Resolves the threshold for a property: property override, then
    /// organization-wide, then the built-in default. First match wins.
    pub fn resolve(&self, property_id: PropertyId) -> Decimal {
        if let Some(threshold) = self.property_overrides.get(&property_id) {
            return *threshold;
        }
        if let Some(threshold) = *self.organization.lock() {
            return threshold;
        }
        DEFAULT_THRESHOLD
    }

    /// Whether an amount needs manual review for this property.
    pub fn requires_approval(&self, property_id: PropertyId, amount: Decimal) -> bool {
        amount >= self.resolve(property_id)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_through_the_tiers() {
        let policy = ThresholdPolicy::new();
        let property = PropertyId(1);

        // Built-in default
        assert_eq!(policy.resolve(property), dec!(10000.00));

        // Organization-wide overrides the default
        policy.set_organization(dec!(5000.00));
        assert_eq!(policy.resolve(property), dec!(5000.00));

        // Property-specific overrides both
        policy.set_property(property, dec!(2500.00));
        assert_eq!(policy.resolve(property), dec!(2500.00));

        // Other properties still see the organization tier
        assert_eq!(policy.resolve(PropertyId(2)), dec!(5000.00));

        // Clearing the override falls back to the organization tier
        policy.clear_property(property);
        assert_eq!(policy.resolve(property), dec!(5000.00));
    }

    #[test]
    fn approval_is_at_or_above_the_threshold() {
        let policy = ThresholdPolicy::new();
        policy.set_organization(dec!(1000.00));

        assert!(!policy.requires_approval(PropertyId(1), dec!(999.99)));
        assert!(policy.requires_approval(PropertyId(1), dec!(1000.00)));
        assert!(policy.requires_approval(PropertyId(1), dec!(1500.00)));
    }
}
