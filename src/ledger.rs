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

//! Ledger posting: the deposit/withdraw protocol.
//!
//! Every attempt runs the full cycle: snapshot `(balance, version)`,
//! validate, compute the new balance, draw a transaction id, and try to
//! commit balance update plus transaction row as one unit. A retry is never
//! just "pick a new id" - the snapshot is taken again, so a withdrawal that
//! raced a concurrent debit re-validates against the fresh balance.
//!
//! Two distinct retry budgets bound the loop: transaction-id collisions
//! consume the allocator's budget (exhaustion surfaces
//! [`BankError::AllocationExhausted`]), commit races against concurrent
//! writers consume [`MAX_COMMIT_RETRIES`] (exhaustion surfaces
//! [`BankError::TransactionConflict`]). Both are transient; the caller may
//! retry the whole operation.

use crate::allocator::IdAllocator;
use crate::base::{AccountNumber, TxnId};
use crate::error::BankError;
use crate::store::{CommitError, MemoryStore};
use crate::transaction::{Transaction, TxnKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Balances are fixed-point with two fractional digits.
pub const BALANCE_SCALE: u32 = 2;

/// Attempts per posting against concurrent balance writers.
pub const MAX_COMMIT_RETRIES: u32 = 5;

/// Outcome of a successful posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub txn_id: TxnId,
    /// Balance after the posted transaction.
    pub balance: Decimal,
}

/// Validates and quantizes a posting amount.
pub(crate) fn posting_amount(amount: Decimal) -> Result<Decimal, BankError> {
    let amount = amount.round_dp(BALANCE_SCALE);
    if amount <= Decimal::ZERO {
        return Err(BankError::InvalidAmount);
    }
    Ok(amount)
}

/// Posts one deposit or withdrawal against a savings account.
pub(crate) fn post(
    store: &MemoryStore,
    txn_ids: &IdAllocator,
    account: AccountNumber,
    kind: TxnKind,
    amount: Decimal,
    date: NaiveDate,
    detail: &str,
) -> Result<Receipt, BankError> {
    let amount = posting_amount(amount)?;

    let mut conflicts = 0;
    loop {
        let result = txn_ids.allocate(|candidate| {
            // Fresh snapshot on every attempt, id collision or not.
            let (balance, version) = store
                .savings_snapshot(account)
                .ok_or(BankError::AccountNotFound)?;

            let new_balance = match kind {
                TxnKind::Deposit => balance + amount,
                TxnKind::Withdraw => {
                    if amount > balance {
                        return Err(BankError::InsufficientFunds);
                    }
                    balance - amount
                }
            };

            let txn = Transaction::new(
                TxnId(candidate),
                account,
                kind,
                amount,
                date,
                detail,
                new_balance,
            );

            match store.commit_savings_txn(version, txn) {
                Ok(()) => Ok(Some(Receipt {
                    txn_id: TxnId(candidate),
                    balance: new_balance,
                })),
                Err(CommitError::TxnIdTaken) => Ok(None),
                Err(CommitError::StaleBalance) => Err(BankError::TransactionConflict),
                Err(CommitError::AccountMissing) => Err(BankError::AccountNotFound),
            }
        });

        match result {
            Err(BankError::TransactionConflict) if conflicts + 1 < MAX_COMMIT_RETRIES => {
                conflicts += 1;
                log::debug!(
                    "balance commit race on account {} (attempt {}/{})",
                    account,
                    conflicts,
                    MAX_COMMIT_RETRIES
                );
            }
            Err(BankError::TransactionConflict) => {
                log::warn!(
                    "posting to account {} gave up after {} commit races",
                    account,
                    MAX_COMMIT_RETRIES
                );
                return Err(BankError::TransactionConflict);
            }
            other => return other,
        }
    }
}
