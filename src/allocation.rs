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

//! Single-winner resource claims.
//!
//! An exclusive resource (a rental unit, for example) can be claimed by
//! exactly one holder at a time. The check-and-insert is atomic through
//! the map's entry API, so concurrent claimants racing for one resource
//! produce exactly one winner.

use crate::error::LedgerError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Exclusive-resource claim registry.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claims: DashMap<String, String>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self {
            claims: DashMap::new(),
        }
    }

    /// Claims a resource for a holder.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ResourceClaimed`] if the resource already has a
    /// holder (including this one; claims do not stack).
    pub fn claim(&self, resource: &str, holder: &str) -> Result<(), LedgerError> {
        match self.claims.entry(resource.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::ResourceClaimed {
                resource: resource.to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(holder.to_string());
                Ok(())
            }
        }
    }

    /// Releases a resource. Only the current holder may release.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotClaimHolder`] if the resource is unclaimed or
    /// held by someone else.
    pub fn release(&self, resource: &str, holder: &str) -> Result<(), LedgerError> {
        match self.claims.entry(resource.to_string()) {
            Entry::Occupied(entry) if entry.get() == holder => {
                entry.remove();
                Ok(())
            }
            _ => Err(LedgerError::NotClaimHolder {
                resource: resource.to_string(),
            }),
        }
    }

    /// The current holder of a resource, if any.
    pub fn holder(&self, resource: &str) -> Option<String> {
        self.claims.get(resource).map(|h| h.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_wins() {
        let registry = ClaimRegistry::new();
        registry.claim("unit:101", "tenant:1").unwrap();

        let loser = registry.claim("unit:101", "tenant:2");
        assert_eq!(
            loser.unwrap_err(),
            LedgerError::ResourceClaimed {
                resource: "unit:101".to_string()
            }
        );
        assert_eq!(registry.holder("unit:101").as_deref(), Some("tenant:1"));
    }

    #[test]
    fn release_requires_the_holder() {
        let registry = ClaimRegistry::new();
        registry.claim("unit:101", "tenant:1").unwrap();

        assert!(registry.release("unit:101", "tenant:2").is_err());
        registry.release("unit:101", "tenant:1").unwrap();
        assert!(registry.holder("unit:101").is_none());

        // Freed resource can be claimed again.
        registry.claim("unit:101", "tenant:2").unwrap();
    }

    #[test]
    fn claims_do_not_stack() {
        let registry = ClaimRegistry::new();
        registry.claim("unit:101", "tenant:1").unwrap();
        assert!(registry.claim("unit:101", "tenant:1").is_err());
    }
}
