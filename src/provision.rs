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

//! Account provisioning: opening savings and loan accounts.
//!
//! Opening an account is one unit of work: ensure the customer exists, look
//! up or create the account-type pair, claim the (customer, type) holding
//! slot, allocate a fresh account number, and insert the type-specific
//! detail row. If any late step fails, everything claimed earlier is rolled
//! back so no reserved-but-unowned number or holding stays observable.
//!
//! Opening-balance rule: a savings account opened at zero records no
//! transaction; a positive opening balance records exactly one opening
//! deposit whose resulting balance equals the opening balance.

use crate::account::{Account, AccountType, LoanDetail, SavingsDetail, normalize_type_pair};
use crate::allocator::IdAllocator;
use crate::base::{AccountNumber, CustomerId, TxnId};
use crate::error::BankError;
use crate::ledger::BALANCE_SCALE;
use crate::store::MemoryStore;
use crate::transaction::{Transaction, TxnKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;

const OPENING_DEPOSIT_DETAIL: &str = "Opening deposit";

/// Runs the shared front half of provisioning: preconditions, type lookup,
/// holding reservation, and account-number allocation.
///
/// On success the account row and holding slot are claimed; the caller must
/// roll both back if a later step fails.
fn claim_account(
    store: &MemoryStore,
    account_numbers: &IdAllocator,
    customer: CustomerId,
    category: &str,
    subtype: Option<&str>,
) -> Result<(Account, AccountType), BankError> {
    if !store.customer_exists(customer) {
        return Err(BankError::CustomerNotFound);
    }

    let (category, subtype) = normalize_type_pair(category, subtype);
    let account_type = store.find_or_create_account_type(&category, subtype.as_deref());

    if store.holding(customer, account_type.id).is_some() {
        return Err(BankError::DuplicateAccount);
    }

    let account = account_numbers.allocate(|candidate| {
        let account = Account {
            number: AccountNumber(candidate),
            customer,
            account_type: account_type.id,
        };
        Ok(store.try_insert_account(account).then_some(account))
    })?;

    // The precheck above already rejected an existing holding, so losing the
    // slot here means a concurrent open won the race.
    if !store.try_reserve_holding(customer, account_type.id, account.number) {
        store.remove_account(account.number);
        return Err(BankError::AccountConflict);
    }

    Ok((account, account_type))
}

fn rollback_claim(store: &MemoryStore, account: &Account) {
    store.remove_account(account.number);
    store.release_holding(account.customer, account.account_type);
}

/// Opens a savings account for `customer`.
pub(crate) fn open_savings(
    store: &MemoryStore,
    account_numbers: &IdAllocator,
    txn_ids: &IdAllocator,
    customer: CustomerId,
    category: &str,
    subtype: Option<&str>,
    detail: SavingsDetail,
    opened_on: NaiveDate,
) -> Result<Account, BankError> {
    let balance = detail.balance.round_dp(BALANCE_SCALE);
    if balance < Decimal::ZERO {
        return Err(BankError::InvalidAmount);
    }
    let detail = SavingsDetail { balance, ..detail };

    let (account, _account_type) = claim_account(store, account_numbers, customer, category, subtype)?;

    let opening_txn = if balance > Decimal::ZERO {
        let staged = txn_ids.allocate(|candidate| {
            let txn = Transaction::new(
                TxnId(candidate),
                account.number,
                TxnKind::Deposit,
                balance,
                opened_on,
                OPENING_DEPOSIT_DETAIL,
                balance,
            );
            Ok(store.try_append_transaction(txn).then_some(TxnId(candidate)))
        });
        match staged {
            Ok(id) => Some(id),
            Err(e) => {
                rollback_claim(store, &account);
                return Err(e);
            }
        }
    } else {
        None
    };

    if let Err(e) = store.insert_savings_detail(account.number, detail, opening_txn) {
        if let Some(id) = opening_txn {
            store.revoke_transaction(id);
        }
        rollback_claim(store, &account);
        return Err(e);
    }

    log::info!(
        "opened savings account {} for customer {}",
        account.number,
        customer
    );
    Ok(account)
}

/// Opens a loan account for `customer`.
pub(crate) fn open_loan(
    store: &MemoryStore,
    account_numbers: &IdAllocator,
    customer: CustomerId,
    category: &str,
    subtype: Option<&str>,
    detail: LoanDetail,
) -> Result<Account, BankError> {
    if detail.total_amount < Decimal::ZERO || detail.balance_amount < Decimal::ZERO {
        return Err(BankError::InvalidAmount);
    }

    let (account, _account_type) = claim_account(store, account_numbers, customer, category, subtype)?;

    if let Err(e) = store.insert_loan_detail(account.number, detail) {
        rollback_claim(store, &account);
        return Err(e);
    }

    log::info!(
        "opened loan account {} for customer {}",
        account.number,
        customer
    );
    Ok(account)
}
