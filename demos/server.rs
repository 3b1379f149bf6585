//! Simple REST API server example for the rent ledger engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /charges` - Create a charge against a tenant
//! - `POST /payments` - Process a payment (idempotent by key)
//! - `POST /payments/:id/nsf` - Reverse a completed payment
//! - `GET /accounts` - List all account balances
//! - `GET /accounts/:name` - Get one account balance by name
//! - `GET /tenants/:id/statement` - Tenant balance plus AR aging
//! - `GET /audit/unbalanced` - Ids of unbalanced journal entries
//! - `POST /sequences/:name` - Issue the next gapless number
//!
//! ## Example Usage
//!
//! ```bash
//! # Charge rent
//! curl -X POST http://localhost:3000/charges \
//!   -H "Content-Type: application/json" \
//!   -d '{"tenant_id": 1, "lease_id": 1, "property_id": 1, "amount": "1500.00", "kind": "rent", "description": "August rent", "due_date": "2026-08-01"}'
//!
//! # Pay it (safe to retry with the same key)
//! curl -X POST http://localhost:3000/payments \
//!   -H "Content-Type: application/json" \
//!   -d '{"tenant_id": 1, "lease_id": 1, "property_id": 1, "amount": "1500.00", "method": "check", "idempotency_key": "pay-001"}'
//!
//! # Check the tenant statement
//! curl http://localhost:3000/tenants/1/statement
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use rent_ledger_rs::{
    ChargeKind, LeaseId, LedgerError, PaymentEngine, PaymentId, PaymentMethod, PropertyId,
    TenantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for creating a charge.
#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub tenant_id: u32,
    pub lease_id: u32,
    pub property_id: u32,
    pub amount: Decimal,
    pub kind: ChargeKind,
    pub description: String,
    pub due_date: NaiveDate,
}

/// Request body for processing a payment.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub tenant_id: u32,
    pub lease_id: u32,
    pub property_id: u32,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub idempotency_key: String,
}

/// Request body for an NSF reversal.
#[derive(Debug, Deserialize)]
pub struct NsfRequest {
    #[serde(default)]
    pub fee: Decimal,
}

/// Response body for a created journal entry.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub entry_id: u64,
    pub trace_id: String,
}

/// Response body for a processed payment.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_id: u64,
    pub status: String,
    pub entry_id: u64,
    pub trace_id: String,
    /// False when an earlier request with the same key settled this
    /// payment.
    pub processed: bool,
}

/// Response body for an account balance.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account: String,
    pub balance: Decimal,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

// === Application State ===

/// Shared application state containing the payment engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PaymentEngine>,
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub struct AppError(LedgerError);

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            LedgerError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            LedgerError::InvalidFee => (StatusCode::BAD_REQUEST, "INVALID_FEE"),
            LedgerError::PaymentNotFound => (StatusCode::NOT_FOUND, "PAYMENT_NOT_FOUND"),
            LedgerError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
            LedgerError::InsufficientFunds => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_FUNDS")
            }
            LedgerError::ResourceClaimed { .. } => (StatusCode::CONFLICT, "RESOURCE_CLAIMED"),
            LedgerError::NotClaimHolder { .. } => (StatusCode::CONFLICT, "NOT_CLAIM_HOLDER"),
            LedgerError::Contention { .. } => (StatusCode::SERVICE_UNAVAILABLE, "CONTENTION"),
            LedgerError::UnbalancedEntry { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UNBALANCED_ENTRY")
            }
            LedgerError::EmptyEntry => (StatusCode::INTERNAL_SERVER_ERROR, "EMPTY_ENTRY"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
                retryable: self.0.is_retryable(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /charges - Create a charge.
async fn create_charge(
    State(state): State<AppState>,
    Json(request): Json<ChargeRequest>,
) -> Result<(StatusCode, Json<EntryResponse>), AppError> {
    let entry = state.engine.create_charge(
        TenantId(request.tenant_id),
        LeaseId(request.lease_id),
        PropertyId(request.property_id),
        request.amount,
        request.kind,
        &request.description,
        request.due_date,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(EntryResponse {
            entry_id: entry.id.0,
            trace_id: entry.trace_id.to_string(),
        }),
    ))
}

/// POST /payments - Process a payment.
async fn process_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let outcome = state.engine.process_payment(
        TenantId(request.tenant_id),
        LeaseId(request.lease_id),
        PropertyId(request.property_id),
        request.amount,
        request.method,
        &request.idempotency_key,
    )?;

    let processed = outcome.is_processed();
    let receipt = outcome.receipt();
    let status = if processed {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(PaymentResponse {
            payment_id: receipt.payment.id.0,
            status: format!("{:?}", receipt.payment.status).to_lowercase(),
            entry_id: receipt.entry_id.0,
            trace_id: receipt.trace_id.to_string(),
            processed,
        }),
    ))
}

/// POST /payments/:id/nsf - Reverse a completed payment.
async fn process_nsf(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<NsfRequest>,
) -> Result<Json<Vec<EntryResponse>>, AppError> {
    let outcome = state.engine.process_nsf(PaymentId(id), request.fee)?;

    let mut entries = vec![EntryResponse {
        entry_id: outcome.reversal.id.0,
        trace_id: outcome.reversal.trace_id.to_string(),
    }];
    if let Some(fee_entry) = outcome.fee {
        entries.push(EntryResponse {
            entry_id: fee_entry.id.0,
            trace_id: fee_entry.trace_id.to_string(),
        });
    }
    Ok(Json(entries))
}

/// GET /accounts/:name - Get one account balance.
///
/// Unknown accounts report a zero balance rather than 404.
async fn get_account(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        balance: state.engine.account_balance_by_name(&name),
        account: name,
    })
}

/// GET /accounts - List all account balances.
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<BalanceResponse>> {
    let balances = state
        .engine
        .balance_snapshot()
        .into_iter()
        .map(|(account, balance)| BalanceResponse {
            account: account.name().to_string(),
            balance,
        })
        .collect();
    Json(balances)
}

/// GET /tenants/:id/statement - Tenant balance plus AR aging.
async fn tenant_statement(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Json<rent_ledger_rs::TenantStatement> {
    Json(state.engine.statement(TenantId(id)))
}

/// GET /audit/unbalanced - Ids of unbalanced journal entries.
async fn audit_unbalanced(State(state): State<AppState>) -> Json<Vec<u64>> {
    Json(
        state
            .engine
            .validate_double_entry()
            .into_iter()
            .map(|id| id.0)
            .collect(),
    )
}

/// POST /sequences/:name - Issue the next number of a named sequence.
async fn next_number(State(state): State<AppState>, Path(name): Path<String>) -> Json<u64> {
    Json(state.engine.next_number(&name))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/charges", post(create_charge))
        .route("/payments", post(process_payment))
        .route("/payments/{id}/nsf", post(process_nsf))
        .route("/accounts", get(list_accounts))
        .route("/accounts/{name}", get(get_account))
        .route("/tenants/{id}/statement", get(tenant_statement))
        .route("/audit/unbalanced", get(audit_unbalanced))
        .route("/sequences/{name}", post(next_number))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let state = AppState {
        engine: Arc::new(PaymentEngine::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Rent ledger API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /charges                 - Create a charge");
    println!("  POST /payments                - Process a payment");
    println!("  POST /payments/:id/nsf        - Reverse a payment (NSF)");
    println!("  GET  /accounts                - List account balances");
    println!("  GET  /accounts/:name          - Get one account balance");
    println!("  GET  /tenants/:id/statement   - Tenant balance + aging");
    println!("  GET  /audit/unbalanced        - Double-entry audit");
    println!("  POST /sequences/:name         - Next gapless number");

    axum::serve(listener, app).await.unwrap();
}
