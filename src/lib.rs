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

//! # Bank Ledger
//!
//! This library provides a banking core engine: customers hold savings and
//! loan accounts identified by randomly allocated 9-digit account numbers,
//! and savings accounts carry an append-only transaction ledger updated
//! under optimistic concurrency.
//!
//! ## Core Components
//!
//! - [`Bank`]: Engine facade for provisioning accounts and posting
//!   deposits/withdrawals
//! - [`IdAllocator`]: Fixed-width random identifier allocation with bounded
//!   retry on collision
//! - [`MemoryStore`]: In-memory relational store with uniqueness-checked
//!   inserts and versioned compare-and-commit
//! - [`BankError`]: Error taxonomy separating terminal failures from
//!   transient, retry-later ones
//!
//! ## Example
//!
//! ```
//! use bank_ledger_rs::{Bank, Customer, CustomerId, SavingsDetail};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let bank = Bank::new();
//! bank.register_customer(Customer {
//!     id: CustomerId(1),
//!     first_name: "Ada".to_string(),
//!     last_name: "Lovelace".to_string(),
//!     email: "ada@example.com".to_string(),
//! })
//! .unwrap();
//!
//! let account = bank
//!     .open_savings(
//!         CustomerId(1),
//!         "Savings",
//!         Some("Regular"),
//!         SavingsDetail {
//!             balance: dec!(0.00),
//!             transfer_limit: dec!(500.00),
//!             branch_code: "BR1".to_string(),
//!         },
//!         NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
//!     )
//!     .unwrap();
//!
//! let receipt = bank
//!     .deposit(
//!         account.number,
//!         dec!(100.00),
//!         NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
//!         "Counter deposit",
//!     )
//!     .unwrap();
//! assert_eq!(receipt.balance, dec!(100.00));
//! ```
//!
//! ## Thread Safety
//!
//! All engine methods take `&self` and coordinate only through the store's
//! atomic primitives, so independent requests run in parallel and requests
//! against the same account serialize by commit order.

pub mod account;
mod allocator;
mod base;
mod engine;
pub mod error;
mod ledger;
mod provision;
mod store;
mod transaction;
mod transaction_log;

pub use account::{Account, AccountType, Customer, LoanDetail, SavingsDetail, normalize_type_pair};
pub use allocator::IdAllocator;
pub use base::{AccountNumber, AccountTypeId, CustomerId, TxnId};
pub use engine::{ACCOUNT_NUMBER_WIDTH, Bank, TXN_ID_WIDTH};
pub use error::BankError;
pub use ledger::{BALANCE_SCALE, Receipt};
pub use store::{CommitError, MemoryStore};
pub use transaction::{Transaction, TxnKind, parse_txn_date};
pub use transaction_log::TransactionLog;
