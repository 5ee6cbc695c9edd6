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

use bank_ledger_rs::{BALANCE_SCALE, Bank, Customer, CustomerId, SavingsDetail, parse_txn_date};
use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Bank Ledger - Replay banking operations from a CSV file
///
/// Reads customer registrations, account openings, deposits, and withdrawals
/// from a CSV file and outputs the resulting savings accounts to stdout.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger-rs")]
#[command(about = "A banking engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected header: op,cust,category,subtype,amount,transfer_limit,
    /// branch,date,detail,first_name,last_name,email
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output the transaction journal (commit order) instead of accounts
    #[arg(long)]
    journal: bool,

    /// Log skipped rows and retries at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let bank = match process_operations(BufReader::new(file)) {
        Ok(bank) => bank,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    let result = if args.journal {
        write_journal(&bank, std::io::stdout())
    } else {
        write_accounts(&bank, std::io::stdout())
    };
    if let Err(e) = result {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Every column after `op` is optional; which ones are required depends on
/// the operation.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    cust: Option<u32>,
    category: Option<String>,
    subtype: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option")]
    transfer_limit: Option<Decimal>,
    branch: Option<String>,
    date: Option<String>,
    detail: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

/// One replayable operation.
#[derive(Debug)]
enum Operation {
    Customer {
        customer: Customer,
    },
    OpenSavings {
        customer: CustomerId,
        category: String,
        subtype: Option<String>,
        detail: SavingsDetail,
        opened_on: NaiveDate,
    },
    Deposit {
        customer: CustomerId,
        category: String,
        subtype: Option<String>,
        amount: Decimal,
        date: NaiveDate,
        detail: String,
    },
    Withdraw {
        customer: CustomerId,
        category: String,
        subtype: Option<String>,
        amount: Decimal,
        date: NaiveDate,
        detail: String,
    },
}

impl CsvRecord {
    /// Converts a CSV record into an operation.
    ///
    /// Returns `None` for unknown ops or rows missing required fields.
    fn into_operation(self) -> Option<Operation> {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());

        match self.op.to_lowercase().as_str() {
            "customer" => Some(Operation::Customer {
                customer: Customer {
                    id: CustomerId(self.cust?),
                    first_name: non_empty(self.first_name)?,
                    last_name: non_empty(self.last_name)?,
                    email: non_empty(self.email)?,
                },
            }),
            "open" => Some(Operation::OpenSavings {
                customer: CustomerId(self.cust?),
                category: non_empty(self.category)?,
                subtype: non_empty(self.subtype),
                detail: SavingsDetail {
                    balance: self.amount.unwrap_or(Decimal::ZERO),
                    transfer_limit: self.transfer_limit.unwrap_or(Decimal::ZERO),
                    branch_code: non_empty(self.branch).unwrap_or_default(),
                },
                opened_on: parse_txn_date(&self.date?).ok()?,
            }),
            "deposit" => Some(Operation::Deposit {
                customer: CustomerId(self.cust?),
                category: non_empty(self.category)?,
                subtype: non_empty(self.subtype),
                amount: self.amount?,
                date: parse_txn_date(&self.date?).ok()?,
                detail: non_empty(self.detail).unwrap_or_default(),
            }),
            "withdraw" => Some(Operation::Withdraw {
                customer: CustomerId(self.cust?),
                category: non_empty(self.category)?,
                subtype: non_empty(self.subtype),
                amount: self.amount?,
                date: parse_txn_date(&self.date?).ok()?,
                detail: non_empty(self.detail).unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

/// Replays operations from a CSV reader.
///
/// Streams the file row by row. Malformed rows and failed operations are
/// logged and skipped; the replay continues, mirroring how independent
/// requests would fail independently against a live service.
///
/// # CSV Format
///
/// Header: `op,cust,category,subtype,amount,transfer_limit,branch,date,detail,first_name,last_name,email`
///
/// - `customer`: requires `cust`, `first_name`, `last_name`, `email`
/// - `open`: requires `cust`, `category`, `date`; `amount` is the opening
///   balance (default 0)
/// - `deposit` / `withdraw`: require `cust`, `category`, `amount`, `date`;
///   the account is resolved through the customer's (category, subtype)
///   holding
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(reader: R) -> Result<Bank, csv::Error> {
    let bank = Bank::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(op) = record.into_operation() else {
                    log::warn!("skipping invalid operation record");
                    continue;
                };
                if let Err(e) = apply(&bank, op) {
                    log::warn!("skipping operation: {}", e);
                }
            }
            Err(e) => {
                log::warn!("skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(bank)
}

fn apply(bank: &Bank, op: Operation) -> Result<(), bank_ledger_rs::BankError> {
    match op {
        Operation::Customer { customer } => bank.register_customer(customer),
        Operation::OpenSavings {
            customer,
            category,
            subtype,
            detail,
            opened_on,
        } => bank
            .open_savings(customer, &category, subtype.as_deref(), detail, opened_on)
            .map(|_| ()),
        Operation::Deposit {
            customer,
            category,
            subtype,
            amount,
            date,
            detail,
        } => {
            let account = bank
                .find_account(customer, &category, subtype.as_deref())
                .ok_or(bank_ledger_rs::BankError::AccountNotFound)?;
            bank.deposit(account.number, amount, date, &detail).map(|_| ())
        }
        Operation::Withdraw {
            customer,
            category,
            subtype,
            amount,
            date,
            detail,
        } => {
            let account = bank
                .find_account(customer, &category, subtype.as_deref())
                .ok_or(bank_ledger_rs::BankError::AccountNotFound)?;
            bank.withdraw(account.number, amount, date, &detail).map(|_| ())
        }
    }
}

/// Savings account state as written to the output CSV.
#[derive(Debug, Serialize)]
struct AccountReport {
    account: u64,
    cust: u32,
    category: String,
    subtype: String,
    balance: Decimal,
    transfer_limit: Decimal,
    branch: String,
}

/// Write savings account states to a CSV writer.
///
/// Columns: `account, cust, category, subtype, balance, transfer_limit, branch`
/// with balances at two decimal places.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(bank: &Bank, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for (account, detail) in bank.savings_accounts() {
        let account_type = bank.account_type(account.account_type);
        wtr.serialize(AccountReport {
            account: account.number.0,
            cust: account.customer.0,
            category: account_type
                .as_ref()
                .map(|at| at.category.clone())
                .unwrap_or_default(),
            subtype: account_type
                .and_then(|at| at.subtype)
                .unwrap_or_default(),
            balance: detail.balance.round_dp(BALANCE_SCALE),
            transfer_limit: detail.transfer_limit.round_dp(BALANCE_SCALE),
            branch: detail.branch_code,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

/// Transaction journal row as written to the output CSV.
#[derive(Debug, Serialize)]
struct JournalReport {
    txn: u64,
    account: u64,
    date: NaiveDate,
    detail: String,
    withdraw: Decimal,
    deposit: Decimal,
    balance: Decimal,
}

/// Write the global transaction journal, in commit order, to a CSV writer.
pub fn write_journal<W: Write>(bank: &Bank, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for txn in bank.drain_journal() {
        wtr.serialize(JournalReport {
            txn: txn.id.0,
            account: txn.account.0,
            date: txn.date,
            detail: txn.detail.clone(),
            withdraw: txn.withdraw_amount.round_dp(BALANCE_SCALE),
            deposit: txn.deposit_amount.round_dp(BALANCE_SCALE),
            balance: txn.balance.round_dp(BALANCE_SCALE),
        })?;
    }

    wtr.flush()?;
    Ok(())
}
