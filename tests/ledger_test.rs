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

//! Component-level tests for the ledger building blocks: journal,
//! balance ledger, AR aging, tenant ledger, idempotency store, sequences
//! and claims.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use rent_ledger_rs::{
    Account, AgingBuckets, ArAging, BalanceLedger, ClaimRegistry, EntryDraft, Idempotent,
    IdempotencyStore, Journal, LedgerError, Posting, SequenceGenerator, SourceKind, SourceRef,
    TenantEntryKind, TenantId, TenantLedger, TraceId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_ago(days: i64) -> NaiveDate {
    today() - ChronoDuration::days(days)
}

fn balanced_draft(amount: Decimal) -> EntryDraft {
    EntryDraft {
        description: "charge".to_string(),
        source: SourceRef {
            kind: SourceKind::Charge,
            id: 1,
        },
        trace_id: TraceId::new(),
        postings: vec![
            Posting::new(Account::AccountsReceivable, amount),
            Posting::new(Account::RentRevenue, -amount),
        ],
    }
}

// === Journal + balance ledger ===

#[test]
fn rejected_draft_leaves_no_trace() {
    let journal = Journal::new();
    let balances = BalanceLedger::new();

    let unbalanced = EntryDraft {
        description: "broken".to_string(),
        source: SourceRef {
            kind: SourceKind::Charge,
            id: 9,
        },
        trace_id: TraceId::new(),
        postings: vec![
            Posting::new(Account::AccountsReceivable, dec!(10.00)),
            Posting::new(Account::RentRevenue, dec!(-9.00)),
        ],
    };
    let result = journal.post(unbalanced, &balances);

    assert_eq!(
        result.unwrap_err(),
        LedgerError::UnbalancedEntry { sum: dec!(1.00) }
    );
    assert!(journal.is_empty());
    assert_eq!(balances.trial_balance(), Decimal::ZERO);
    assert_eq!(balances.balance(Account::AccountsReceivable), Decimal::ZERO);
}

#[test]
fn trial_balance_stays_zero_over_many_entries() {
    let journal = Journal::new();
    let balances = BalanceLedger::new();

    for cents in 1..=100i64 {
        journal
            .post(balanced_draft(Decimal::new(cents, 2)), &balances)
            .unwrap();
    }

    assert_eq!(journal.len(), 100);
    assert_eq!(balances.trial_balance(), Decimal::ZERO);
    // 1 + 2 + ... + 100 cents = $50.50
    assert_eq!(balances.balance(Account::AccountsReceivable), dec!(50.50));
    assert!(journal.unbalanced_entries().is_empty());
}

#[test]
fn snapshot_is_internally_consistent() {
    let journal = Journal::new();
    let balances = BalanceLedger::new();
    journal.post(balanced_draft(dec!(123.45)), &balances).unwrap();

    let snapshot = balances.snapshot();
    assert_eq!(snapshot.len(), Account::ALL.len());
    let sum: Decimal = snapshot.iter().map(|(_, balance)| *balance).sum();
    assert_eq!(sum, Decimal::ZERO);
}

// === AR aging ===

#[test]
fn aging_drains_buckets_in_strict_age_order() {
    let aging = ArAging::new();
    let tenant = TenantId(1);

    aging.add_charge(tenant, dec!(300.00), days_ago(120), today());
    aging.add_charge(tenant, dec!(200.00), days_ago(75), today());
    aging.add_charge(tenant, dec!(100.00), days_ago(45), today());
    aging.add_charge(tenant, dec!(50.00), days_ago(15), today());
    aging.add_charge(tenant, dec!(500.00), today(), today());

    // Drains 300 (90+), 200 (90), 100 (60), then 40 of the 50 (30)
    aging.apply_payment(tenant, dec!(640.00));

    let buckets = aging.buckets(tenant);
    assert_eq!(buckets.days_90_plus, dec!(0.00));
    assert_eq!(buckets.days_90, dec!(0.00));
    assert_eq!(buckets.days_60, dec!(0.00));
    assert_eq!(buckets.days_30, dec!(10.00));
    assert_eq!(buckets.current, dec!(500.00));
    assert_eq!(buckets.total, dec!(510.00));
    assert!(buckets.is_consistent());
}

#[test]
fn aging_assignment_is_fixed_at_charge_time() {
    let aging = ArAging::new();
    let tenant = TenantId(1);

    // A charge due 10 days ago ages into days_30 and stays there; there
    // is no background sweep moving it as more time passes.
    aging.add_charge(tenant, dec!(100.00), days_ago(10), today());
    let before = aging.buckets(tenant);
    let after = aging.buckets(tenant);
    assert_eq!(before, after);
    assert_eq!(after.days_30, dec!(100.00));
}

#[test]
fn partial_payments_accumulate_into_credit() {
    let aging = ArAging::new();
    let tenant = TenantId(1);

    aging.add_charge(tenant, dec!(100.00), today(), today());
    aging.apply_payment(tenant, dec!(60.00));
    aging.apply_payment(tenant, dec!(60.00));

    let buckets = aging.buckets(tenant);
    assert_eq!(buckets.current, dec!(-20.00));
    assert_eq!(buckets.total, dec!(-20.00));
}

#[test]
fn tenants_age_independently() {
    let aging = ArAging::new();
    aging.add_charge(TenantId(1), dec!(100.00), days_ago(120), today());
    aging.add_charge(TenantId(2), dec!(200.00), today(), today());

    assert_eq!(aging.buckets(TenantId(1)).days_90_plus, dec!(100.00));
    assert_eq!(aging.buckets(TenantId(2)).current, dec!(200.00));
    assert_eq!(aging.buckets(TenantId(3)), AgingBuckets::zero());
}

// === Tenant ledger ===

#[test]
fn tenant_ledger_kinds_carry_their_signs() {
    let ledger = TenantLedger::new();
    let tenant = TenantId(1);

    ledger.append(tenant, TenantEntryKind::Charge, dec!(1500.00), "rent", today());
    ledger.append(tenant, TenantEntryKind::Payment, dec!(-1500.00), "payment", today());
    ledger.append(tenant, TenantEntryKind::Adjustment, dec!(1500.00), "nsf", today());
    ledger.append(tenant, TenantEntryKind::Credit, dec!(-25.00), "goodwill", today());

    assert_eq!(ledger.balance(tenant), dec!(1475.00));

    let entries = ledger.entries(tenant);
    assert_eq!(entries.len(), 4);
    // Each entry carries the balance immediately after it
    assert_eq!(entries[0].running_balance, dec!(1500.00));
    assert_eq!(entries[1].running_balance, dec!(0.00));
    assert_eq!(entries[2].running_balance, dec!(1500.00));
    assert_eq!(entries[3].running_balance, dec!(1475.00));
}

#[test]
fn tenant_ids_lists_only_tenants_with_history() {
    let ledger = TenantLedger::new();
    ledger.append(TenantId(3), TenantEntryKind::Charge, dec!(1.00), "a", today());
    ledger.append(TenantId(1), TenantEntryKind::Charge, dec!(1.00), "b", today());

    assert_eq!(ledger.tenant_ids(), vec![TenantId(1), TenantId(3)]);
}

// === Idempotency store ===

#[test]
fn execute_runs_work_once_per_key() {
    let store: IdempotencyStore<u64> = IdempotencyStore::new();
    let mut runs = 0u64;

    for _ in 0..5 {
        let outcome = store
            .execute("op-1", Duration::from_millis(50), || {
                runs += 1;
                Ok(runs)
            })
            .unwrap();
        assert_eq!(outcome.into_inner(), 1);
    }
    assert_eq!(runs, 1);
}

#[test]
fn distinct_keys_do_not_interfere() {
    let store: IdempotencyStore<&'static str> = IdempotencyStore::new();

    let a = store
        .execute("a", Duration::from_millis(50), || Ok("a-result"))
        .unwrap();
    let b = store
        .execute("b", Duration::from_millis(50), || Ok("b-result"))
        .unwrap();

    assert_eq!(a, Idempotent::Fresh("a-result"));
    assert_eq!(b, Idempotent::Fresh("b-result"));
}

#[test]
fn record_timestamps_are_set() {
    let store: IdempotencyStore<u32> = IdempotencyStore::new();
    let before = Utc::now();
    store.set_record("k", 9);
    let record = store.record("k").unwrap();
    assert!(record.processed_at >= before);
    assert_eq!(record.result, 9);
}

// === Sequences ===

#[test]
fn sequences_stay_gapless_across_interleaved_use() {
    let sequences = SequenceGenerator::new();
    sequences.register("check", 1000);

    let mut issued = Vec::new();
    for _ in 0..20 {
        issued.push(sequences.next("check"));
        sequences.next("receipt");
    }

    let expected: Vec<u64> = (1001..=1020).collect();
    assert_eq!(issued, expected);
    assert_eq!(sequences.current("receipt"), 20);
}

// === Claims ===

#[test]
fn claims_are_per_resource() {
    let registry = ClaimRegistry::new();

    registry.claim("unit:101", "tenant:1").unwrap();
    registry.claim("unit:102", "tenant:1").unwrap();
    assert!(registry.claim("unit:101", "tenant:2").is_err());
    assert_eq!(registry.holder("unit:102").as_deref(), Some("tenant:1"));
    assert_eq!(registry.holder("unit:103"), None);
}
