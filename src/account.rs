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

//! Customer, account, and account-detail records.
//!
//! An [`Account`] links a customer to an [`AccountType`] under a unique
//! account number. The money-bearing state lives in the type-specific detail
//! row: [`SavingsDetail`] for savings accounts (mutable balance, owned by the
//! ledger), [`LoanDetail`] for loan accounts.

use crate::base::{AccountNumber, AccountTypeId, CustomerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Thin customer record.
///
/// Only what account provisioning needs: provisioning checks existence and
/// nothing else. Full customer CRUD (addresses, postal geography) lives
/// outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A (category, subtype) account-type pair, e.g. `("Savings", Some("Regular"))`.
///
/// Pairs are deduplicated by exact match on the normalized strings and
/// created lazily the first time a request mentions them. An absent subtype
/// only ever matches an absent subtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountType {
    pub id: AccountTypeId,
    pub category: String,
    pub subtype: Option<String>,
}

impl AccountType {
    /// Whether this pair matches the given normalized (category, subtype).
    pub fn matches(&self, category: &str, subtype: Option<&str>) -> bool {
        self.category == category && self.subtype.as_deref() == subtype
    }
}

/// Normalizes a raw (category, subtype) pair for lookup and storage.
///
/// Trims surrounding whitespace and title-cases each word, so "savings" and
/// " SAVINGS " name the same type. A subtype that is empty after trimming is
/// treated as absent.
pub fn normalize_type_pair(category: &str, subtype: Option<&str>) -> (String, Option<String>) {
    let category = title_case(category);
    let subtype = subtype.map(title_case).filter(|s| !s.is_empty());
    (category, subtype)
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// An account held by a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub number: AccountNumber,
    pub customer: CustomerId,
    pub account_type: AccountTypeId,
}

/// Savings-specific account state.
///
/// `balance` is the single mutable money field in the system. Only the
/// ledger writes it, and every write is paired with an appended transaction
/// row carrying the same resulting balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsDetail {
    pub balance: Decimal,
    pub transfer_limit: Decimal,
    pub branch_code: String,
}

/// Loan-specific account state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDetail {
    pub emi_id: u32,
    pub balance_amount: Decimal,
    pub branch_code: String,
    pub rate_of_interest: Decimal,
    pub duration_months: u32,
    pub total_amount: Decimal,
}
