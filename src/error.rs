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

//! Error types for account provisioning and ledger posting.
//!
//! Only two conditions are retried in-process: transaction-id collisions and
//! balance commit races, each up to its bound. When a bound is exhausted the
//! corresponding transient error ([`AllocationExhausted`] or
//! [`TransactionConflict`]) is surfaced so the caller can decide to retry
//! later. Everything else is a terminal outcome of the request.
//!
//! [`AllocationExhausted`]: BankError::AllocationExhausted
//! [`TransactionConflict`]: BankError::TransactionConflict

use thiserror::Error;

/// Banking operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    /// Referenced customer does not exist
    #[error("customer not found")]
    CustomerNotFound,

    /// Referenced account does not exist (or is not a savings account)
    #[error("account not found")]
    AccountNotFound,

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Transaction date is neither a date nor an ISO datetime
    #[error("invalid transaction date")]
    InvalidDate,

    /// Withdrawal exceeds the current balance
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Customer id is already registered
    #[error("customer already registered")]
    DuplicateCustomer,

    /// Customer already holds an account of this type/subtype
    #[error("account of this type already exists for customer")]
    DuplicateAccount,

    /// A concurrent request created the conflicting account first
    #[error("account conflict detected")]
    AccountConflict,

    /// Ran out of retries while reserving a unique identifier
    #[error("unable to allocate identifier, retry later")]
    AllocationExhausted,

    /// Ran out of retries while committing against concurrent writers
    #[error("transaction conflict, retry later")]
    TransactionConflict,
}

impl BankError {
    /// Whether the failure is transient and worth retrying by the caller.
    ///
    /// Maps to HTTP 503 / "try again later" at an API boundary; all other
    /// errors describe a terminal outcome of the request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BankError::AllocationExhausted | BankError::TransactionConflict
        )
    }
}
