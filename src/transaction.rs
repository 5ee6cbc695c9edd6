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

//! Immutable ledger transaction rows.
//!
//! A [`Transaction`] is a snapshot, not just a delta: besides the posted
//! amount it records the balance that resulted from applying it. Exactly one
//! of the withdraw/deposit amounts is non-zero per row. Rows are created once
//! and never mutated or deleted.

use crate::base::{AccountNumber, TxnId};
use crate::error::BankError;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a posted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnKind {
    Deposit,
    Withdraw,
}

/// One row of an account's append-only transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxnId,
    pub account: AccountNumber,
    pub date: NaiveDate,
    pub detail: String,
    pub withdraw_amount: Decimal,
    pub deposit_amount: Decimal,
    /// Running balance after this transaction was applied.
    pub balance: Decimal,
}

impl Transaction {
    /// Builds a row with the amount on the side matching `kind` and zero on
    /// the other.
    pub fn new(
        id: TxnId,
        account: AccountNumber,
        kind: TxnKind,
        amount: Decimal,
        date: NaiveDate,
        detail: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        let (withdraw_amount, deposit_amount) = match kind {
            TxnKind::Deposit => (Decimal::ZERO, amount),
            TxnKind::Withdraw => (amount, Decimal::ZERO),
        };
        Self {
            id,
            account,
            date,
            detail: detail.into(),
            withdraw_amount,
            deposit_amount,
            balance,
        }
    }

    pub fn kind(&self) -> TxnKind {
        if self.withdraw_amount > Decimal::ZERO {
            TxnKind::Withdraw
        } else {
            TxnKind::Deposit
        }
    }

    /// The posted amount, regardless of direction.
    pub fn amount(&self) -> Decimal {
        match self.kind() {
            TxnKind::Deposit => self.deposit_amount,
            TxnKind::Withdraw => self.withdraw_amount,
        }
    }

    /// The amount as a signed delta: positive for deposits, negative for
    /// withdrawals.
    pub fn signed_amount(&self) -> Decimal {
        self.deposit_amount - self.withdraw_amount
    }
}

/// Parses a transaction date, accepting `YYYY-MM-DD` or a full ISO datetime.
///
/// Only the date part is kept either way; transaction rows store dates, not
/// timestamps.
pub fn parse_txn_date(raw: &str) -> Result<NaiveDate, BankError> {
    let raw = raw.trim();
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(date);
    }
    if let Ok(dt) = raw.parse::<NaiveDateTime>() {
        return Ok(dt.date());
    }
    // Space-separated datetimes ("2024-03-01 14:30:00") are not covered by
    // the FromStr impls above.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .map_err(|_| BankError::InvalidDate)
}
