//! Simple REST API server example for the banking engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /customers` - Register a customer
//! - `POST /customers/{id}/savings` - Open a savings account
//! - `POST /customers/{id}/loan` - Open a loan account
//! - `POST /customers/{id}/savings/deposit` - Deposit into savings
//! - `POST /customers/{id}/savings/withdraw` - Withdraw from savings
//! - `GET /accounts/{acct}` - Get a savings account by number
//! - `GET /accounts/{acct}/transactions` - Transaction history (commit order)
//!
//! ## Example Usage
//!
//! ```bash
//! # Register a customer
//! curl -X POST http://localhost:3000/customers \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": 1, "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"}'
//!
//! # Open a savings account
//! curl -X POST http://localhost:3000/customers/1/savings \
//!   -H "Content-Type: application/json" \
//!   -d '{"account_type": "Savings", "acc_subtype": "Regular", "balance": "0.00", "transfer_limit": "500.00", "branch_code": "BR1"}'
//!
//! # Deposit
//! curl -X POST http://localhost:3000/customers/1/savings/deposit \
//!   -H "Content-Type: application/json" \
//!   -d '{"acct_num": 123456789, "amount": "100.00", "txn_date": "2024-01-03", "txn_detail": "Counter deposit"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bank_ledger_rs::{
    AccountNumber, Bank, BankError, Customer, CustomerId, LoanDetail, SavingsDetail, Transaction,
    parse_txn_date,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct RegisterCustomerRequest {
    pub id: u32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenSavingsRequest {
    pub account_type: String,
    pub acc_subtype: Option<String>,
    pub balance: Decimal,
    pub transfer_limit: Decimal,
    pub branch_code: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenLoanRequest {
    pub account_type: String,
    pub acc_subtype: Option<String>,
    pub emi_id: u32,
    pub balance_amount: Decimal,
    pub branch_code: String,
    pub rate_of_interest: Decimal,
    pub loan_duration: u32,
    pub total_loan_amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TxnRequest {
    pub acct_num: u64,
    pub amount: Decimal,
    pub txn_date: String,
    pub txn_detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OpenAccountResponse {
    pub acct_num: u64,
    pub cust_id: u32,
    pub account_type: String,
    pub acc_subtype: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TxnResponse {
    pub cust_id: u32,
    pub acct_num: u64,
    pub txn_id: u64,
    pub amount: Decimal,
    pub txn_date: NaiveDate,
    pub new_balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub acct_num: u64,
    pub cust_id: u32,
    pub balance: Decimal,
    pub transfer_limit: Decimal,
    pub branch_code: String,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

#[derive(Clone)]
pub struct AppState {
    pub bank: Arc<Bank>,
}

// === Error Handling ===

/// Wrapper for converting `BankError` into HTTP responses.
///
/// Not-found maps to 404, duplicate/conflict/insufficient-funds to 409,
/// exhausted allocation to 503, bad input to 400.
pub struct AppError(BankError);

impl From<BankError> for AppError {
    fn from(err: BankError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            BankError::CustomerNotFound => (StatusCode::NOT_FOUND, "CUSTOMER_NOT_FOUND"),
            BankError::AccountNotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            BankError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            BankError::InvalidDate => (StatusCode::BAD_REQUEST, "INVALID_DATE"),
            BankError::InsufficientFunds => (StatusCode::CONFLICT, "INSUFFICIENT_FUNDS"),
            BankError::DuplicateCustomer => (StatusCode::CONFLICT, "DUPLICATE_CUSTOMER"),
            BankError::DuplicateAccount => (StatusCode::CONFLICT, "DUPLICATE_ACCOUNT"),
            BankError::AccountConflict => (StatusCode::CONFLICT, "ACCOUNT_CONFLICT"),
            BankError::TransactionConflict => (StatusCode::CONFLICT, "TRANSACTION_CONFLICT"),
            BankError::AllocationExhausted => {
                (StatusCode::SERVICE_UNAVAILABLE, "ALLOCATION_EXHAUSTED")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

fn not_found(code: &str, error: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
}

// === Handlers ===

/// POST /customers - Register a customer.
async fn register_customer(
    State(state): State<AppState>,
    Json(request): Json<RegisterCustomerRequest>,
) -> Result<StatusCode, AppError> {
    state.bank.register_customer(Customer {
        id: CustomerId(request.id),
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
    })?;
    Ok(StatusCode::CREATED)
}

/// POST /customers/{id}/savings - Open a savings account.
async fn open_savings(
    State(state): State<AppState>,
    Path(cust_id): Path<u32>,
    Json(request): Json<OpenSavingsRequest>,
) -> Result<(StatusCode, Json<OpenAccountResponse>), AppError> {
    let account = state.bank.open_savings(
        CustomerId(cust_id),
        &request.account_type,
        request.acc_subtype.as_deref(),
        SavingsDetail {
            balance: request.balance,
            transfer_limit: request.transfer_limit,
            branch_code: request.branch_code,
        },
        Utc::now().date_naive(),
    )?;

    let account_type = state.bank.account_type(account.account_type);
    Ok((
        StatusCode::CREATED,
        Json(OpenAccountResponse {
            acct_num: account.number.0,
            cust_id,
            account_type: account_type
                .as_ref()
                .map(|at| at.category.clone())
                .unwrap_or_default(),
            acc_subtype: account_type.and_then(|at| at.subtype),
        }),
    ))
}

/// POST /customers/{id}/loan - Open a loan account.
async fn open_loan(
    State(state): State<AppState>,
    Path(cust_id): Path<u32>,
    Json(request): Json<OpenLoanRequest>,
) -> Result<(StatusCode, Json<OpenAccountResponse>), AppError> {
    let account = state.bank.open_loan(
        CustomerId(cust_id),
        &request.account_type,
        request.acc_subtype.as_deref(),
        LoanDetail {
            emi_id: request.emi_id,
            balance_amount: request.balance_amount,
            branch_code: request.branch_code,
            rate_of_interest: request.rate_of_interest,
            duration_months: request.loan_duration,
            total_amount: request.total_loan_amount,
        },
    )?;

    let account_type = state.bank.account_type(account.account_type);
    Ok((
        StatusCode::CREATED,
        Json(OpenAccountResponse {
            acct_num: account.number.0,
            cust_id,
            account_type: account_type
                .as_ref()
                .map(|at| at.category.clone())
                .unwrap_or_default(),
            acc_subtype: account_type.and_then(|at| at.subtype),
        }),
    ))
}

/// Verifies the account exists and belongs to the customer in the path.
fn owned_account(
    bank: &Bank,
    cust_id: u32,
    acct_num: u64,
) -> Result<AccountNumber, AppError> {
    let number = AccountNumber(acct_num);
    match bank.account(number) {
        Some(account) if account.customer == CustomerId(cust_id) => Ok(number),
        _ => Err(AppError(BankError::AccountNotFound)),
    }
}

/// POST /customers/{id}/savings/deposit - Deposit into savings.
async fn deposit(
    State(state): State<AppState>,
    Path(cust_id): Path<u32>,
    Json(request): Json<TxnRequest>,
) -> Result<(StatusCode, Json<TxnResponse>), AppError> {
    let number = owned_account(&state.bank, cust_id, request.acct_num)?;
    let date = parse_txn_date(&request.txn_date)?;

    let receipt = state.bank.deposit(
        number,
        request.amount,
        date,
        request.txn_detail.as_deref().unwrap_or_default(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(TxnResponse {
            cust_id,
            acct_num: request.acct_num,
            txn_id: receipt.txn_id.0,
            amount: request.amount,
            txn_date: date,
            new_balance: receipt.balance,
        }),
    ))
}

/// POST /customers/{id}/savings/withdraw - Withdraw from savings.
async fn withdraw(
    State(state): State<AppState>,
    Path(cust_id): Path<u32>,
    Json(request): Json<TxnRequest>,
) -> Result<(StatusCode, Json<TxnResponse>), AppError> {
    let number = owned_account(&state.bank, cust_id, request.acct_num)?;
    let date = parse_txn_date(&request.txn_date)?;

    let receipt = state.bank.withdraw(
        number,
        request.amount,
        date,
        request.txn_detail.as_deref().unwrap_or_default(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(TxnResponse {
            cust_id,
            acct_num: request.acct_num,
            txn_id: receipt.txn_id.0,
            amount: request.amount,
            txn_date: date,
            new_balance: receipt.balance,
        }),
    ))
}

/// GET /accounts/{acct} - Get a savings account by number.
async fn get_account(
    State(state): State<AppState>,
    Path(acct_num): Path<u64>,
) -> Result<Json<AccountResponse>, (StatusCode, Json<ErrorResponse>)> {
    let number = AccountNumber(acct_num);
    let account = state
        .bank
        .account(number)
        .ok_or_else(|| not_found("ACCOUNT_NOT_FOUND", "Account not found"))?;
    let detail = state
        .bank
        .savings_detail(number)
        .ok_or_else(|| not_found("ACCOUNT_NOT_FOUND", "Savings detail not found"))?;

    Ok(Json(AccountResponse {
        acct_num,
        cust_id: account.customer.0,
        balance: detail.balance,
        transfer_limit: detail.transfer_limit,
        branch_code: detail.branch_code,
    }))
}

/// GET /accounts/{acct}/transactions - Transaction history in commit order.
async fn list_transactions(
    State(state): State<AppState>,
    Path(acct_num): Path<u64>,
) -> Result<Json<Vec<Transaction>>, (StatusCode, Json<ErrorResponse>)> {
    let number = AccountNumber(acct_num);
    if state.bank.savings_detail(number).is_none() {
        return Err(not_found("ACCOUNT_NOT_FOUND", "Account not found"));
    }
    Ok(Json(state.bank.transactions(number)))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/customers", post(register_customer))
        .route("/customers/{id}/savings", post(open_savings))
        .route("/customers/{id}/loan", post(open_loan))
        .route("/customers/{id}/savings/deposit", post(deposit))
        .route("/customers/{id}/savings/withdraw", post(withdraw))
        .route("/accounts/{acct}", get(get_account))
        .route("/accounts/{acct}/transactions", get(list_transactions))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    let _ = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    let state = AppState {
        bank: Arc::new(Bank::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Bank API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /customers                        - Register a customer");
    println!("  POST /customers/:id/savings            - Open a savings account");
    println!("  POST /customers/:id/loan               - Open a loan account");
    println!("  POST /customers/:id/savings/deposit    - Deposit");
    println!("  POST /customers/:id/savings/withdraw   - Withdraw");
    println!("  GET  /accounts/:acct                   - Get account");
    println!("  GET  /accounts/:acct/transactions      - Transaction history");

    axum::serve(listener, app).await.unwrap();
}
