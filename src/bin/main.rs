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

use chrono::{NaiveDate, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rent_ledger_rs::{
    ChargeKind, LeaseId, PaymentEngine, PaymentId, PaymentMethod, PropertyId, TenantId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Rent Ledger - Process accounting operation CSV files
///
/// Reads charges, payments, NSF reversals and owner distributions from a
/// CSV file and outputs per-tenant statements (balance plus AR aging) to
/// stdout.
#[derive(Parser, Debug)]
#[command(name = "rent-ledger-rs")]
#[command(about = "A payment-to-ledger engine that processes operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,tenant,lease,property,amount,detail,due,reference
    /// Example: cargo run -- operations.csv > statements.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Process operations from CSV
    let engine = match process_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    // Write statements to stdout
    if let Err(e) = write_statements(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, tenant, lease, property, amount, detail, due, reference`
/// - `detail` carries the charge kind (`rent`, `late_fee`, `utility`) or
///   payment method (`check`, `ach`, `card`, `cash`, `money_order`)
/// - `reference` carries the idempotency key for payments and the
///   payment id for NSF rows
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    tenant: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    lease: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    property: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    detail: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    due: Option<NaiveDate>,
    reference: Option<String>,
}

/// A parsed operation ready for the engine.
#[derive(Debug)]
enum Operation {
    Charge {
        tenant: TenantId,
        lease: LeaseId,
        property: PropertyId,
        amount: Decimal,
        kind: ChargeKind,
        due: NaiveDate,
    },
    Payment {
        tenant: TenantId,
        lease: LeaseId,
        property: PropertyId,
        amount: Decimal,
        method: PaymentMethod,
        key: String,
    },
    Nsf {
        payment: PaymentId,
        fee: Decimal,
    },
    Distribution {
        property: PropertyId,
        amount: Decimal,
    },
}

impl CsvRecord {
    /// Converts a CSV record to an operation.
    ///
    /// Returns `None` for unknown ops or missing required fields. `row`
    /// seeds an idempotency key for payment rows without a reference.
    fn into_operation(self, row: usize) -> Option<Operation> {
        match self.op.to_lowercase().as_str() {
            "charge" => Some(Operation::Charge {
                tenant: TenantId(self.tenant?),
                lease: LeaseId(self.lease?),
                property: PropertyId(self.property?),
                amount: self.amount?,
                kind: ChargeKind::parse(self.detail?.as_str())?,
                due: self.due.unwrap_or_else(|| Utc::now().date_naive()),
            }),
            "payment" => Some(Operation::Payment {
                tenant: TenantId(self.tenant?),
                lease: LeaseId(self.lease?),
                property: PropertyId(self.property?),
                amount: self.amount?,
                method: PaymentMethod::parse(self.detail?.as_str())?,
                key: self
                    .reference
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| format!("cli-row-{}", row)),
            }),
            "nsf" => Some(Operation::Nsf {
                payment: PaymentId(self.reference?.parse().ok()?),
                fee: self.amount.unwrap_or(Decimal::ZERO),
            }),
            "distribution" => Some(Operation::Distribution {
                property: PropertyId(self.property?),
                amount: self.amount?,
            }),
            _ => None,
        }
    }
}

/// Process operations from a CSV reader.
///
/// Streaming parse; malformed rows and rejected operations are skipped
/// so one bad row never aborts a statement run.
///
/// # CSV Format
///
/// Expected columns: `op, tenant, lease, property, amount, detail, due, reference`
///
/// # Example
///
/// ```csv
/// op,tenant,lease,property,amount,detail,due,reference
/// charge,1,1,1,1500.00,rent,2026-08-01,
/// payment,1,1,1,1500.00,check,,pay-001
/// nsf,,,,35.00,,,1
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is
/// invalid. Individual operation errors are logged in debug mode but
/// don't stop processing.
pub fn process_operations<R: Read>(reader: R) -> Result<PaymentEngine, csv::Error> {
    let engine = PaymentEngine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " charge "
        .flexible(true) // Allow missing trailing fields
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for (row, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        match result {
            Ok(record) => {
                let Some(op) = record.into_operation(row) else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid operation record at row {}", row);
                    continue;
                };

                // Process operation, ignoring errors (silent failure)
                let outcome = match op {
                    Operation::Charge {
                        tenant,
                        lease,
                        property,
                        amount,
                        kind,
                        due,
                    } => engine
                        .create_charge(tenant, lease, property, amount, kind, "csv charge", due)
                        .map(|_| ()),
                    Operation::Payment {
                        tenant,
                        lease,
                        property,
                        amount,
                        method,
                        key,
                    } => engine
                        .process_payment(tenant, lease, property, amount, method, &key)
                        .map(|_| ()),
                    Operation::Nsf { payment, fee } => {
                        engine.process_nsf(payment, fee).map(|_| ())
                    }
                    Operation::Distribution { property, amount } => {
                        engine.record_distribution(property, amount).map(|_| ())
                    }
                };
                if let Err(e) = outcome {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping row {}: {}", row, e);
                }
            }
            Err(e) => {
                // Skip malformed rows
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(engine)
}

/// Write tenant statements to a CSV writer.
///
/// Outputs one row per tenant with the running balance and AR aging
/// buckets, amounts rounded to cents.
///
/// # CSV Format
///
/// Columns: `tenant, balance, current, days_30, days_60, days_90, days_90_plus, total`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_statements<W: Write>(engine: &PaymentEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for tenant in engine.tenant_ids() {
        wtr.serialize(engine.statement(tenant))?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}
