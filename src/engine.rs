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

//! Banking engine facade.
//!
//! [`Bank`] wires the in-memory store to the two identifier allocators and
//! exposes the public operations: customer registration, opening savings and
//! loan accounts, and posting deposits/withdrawals.
//!
//! # Concurrency
//!
//! All methods take `&self` and are safe to call from many threads. The
//! engine holds no locks of its own; coordination happens entirely through
//! the store's uniqueness-checked inserts and versioned commits, so two
//! transactions against the same account are linearized by whichever commits
//! first and the loser recomputes against the fresh balance.

use crate::account::{Account, AccountType, Customer, LoanDetail, SavingsDetail};
use crate::allocator::IdAllocator;
use crate::base::{AccountNumber, AccountTypeId, CustomerId, TxnId};
use crate::error::BankError;
use crate::ledger::{self, Receipt};
use crate::provision;
use crate::store::MemoryStore;
use crate::transaction::{Transaction, TxnKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Digits in an account number.
pub const ACCOUNT_NUMBER_WIDTH: u32 = 9;
/// Digits in a transaction id.
pub const TXN_ID_WIDTH: u32 = 9;

/// Draw attempts before account-number allocation gives up.
const MAX_ACCTNUM_RETRIES: u32 = 5;
/// Draw attempts before transaction-id allocation gives up.
const MAX_TXNID_RETRIES: u32 = 7;

/// Banking engine owning the store and identifier namespaces.
///
/// # Invariants
///
/// - Account numbers and transaction ids are unique within their namespace
///   and exactly nine digits.
/// - A customer holds at most one account per (category, subtype) pair.
/// - A savings balance always equals the balance recorded on the account's
///   most recent transaction (or the opening balance when none exists).
/// - Transaction rows are append-only; a failed operation leaves no row and
///   no balance change behind.
pub struct Bank {
    store: MemoryStore,
    account_numbers: IdAllocator,
    txn_ids: IdAllocator,
}

impl Bank {
    /// Creates an engine with no customers or accounts.
    pub fn new() -> Self {
        Bank {
            store: MemoryStore::new(),
            account_numbers: IdAllocator::new(ACCOUNT_NUMBER_WIDTH, MAX_ACCTNUM_RETRIES),
            txn_ids: IdAllocator::new(TXN_ID_WIDTH, MAX_TXNID_RETRIES),
        }
    }

    // === Customers ===

    /// Registers a customer.
    ///
    /// # Errors
    ///
    /// [`BankError::DuplicateCustomer`] if the id is already registered.
    pub fn register_customer(&self, customer: Customer) -> Result<(), BankError> {
        self.store.insert_customer(customer)
    }

    pub fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.store.customer(id)
    }

    // === Provisioning ===

    /// Opens a savings account.
    ///
    /// The (category, subtype) pair is normalized and created on first use.
    /// A positive opening balance records an opening deposit transaction
    /// dated `opened_on`; a zero balance records none.
    ///
    /// # Errors
    ///
    /// - [`BankError::CustomerNotFound`] - unknown customer.
    /// - [`BankError::InvalidAmount`] - negative opening balance.
    /// - [`BankError::DuplicateAccount`] - customer already holds this pair.
    /// - [`BankError::AccountConflict`] - a concurrent open won the race.
    /// - [`BankError::AllocationExhausted`] - id allocation ran out of
    ///   retries; transient, retry later.
    pub fn open_savings(
        &self,
        customer: CustomerId,
        category: &str,
        subtype: Option<&str>,
        detail: SavingsDetail,
        opened_on: NaiveDate,
    ) -> Result<Account, BankError> {
        provision::open_savings(
            &self.store,
            &self.account_numbers,
            &self.txn_ids,
            customer,
            category,
            subtype,
            detail,
            opened_on,
        )
    }

    /// Opens a loan account. Same preconditions as [`open_savings`], minus
    /// the opening-transaction rule (loans keep no ledger here).
    ///
    /// [`open_savings`]: Bank::open_savings
    pub fn open_loan(
        &self,
        customer: CustomerId,
        category: &str,
        subtype: Option<&str>,
        detail: LoanDetail,
    ) -> Result<Account, BankError> {
        provision::open_loan(
            &self.store,
            &self.account_numbers,
            customer,
            category,
            subtype,
            detail,
        )
    }

    // === Ledger ===

    /// Deposits `amount` into a savings account.
    ///
    /// # Errors
    ///
    /// - [`BankError::AccountNotFound`] - no savings account with this number.
    /// - [`BankError::InvalidAmount`] - amount not positive.
    /// - [`BankError::AllocationExhausted`] / [`BankError::TransactionConflict`]
    ///   - retry budgets exhausted; transient.
    pub fn deposit(
        &self,
        account: AccountNumber,
        amount: Decimal,
        date: NaiveDate,
        detail: &str,
    ) -> Result<Receipt, BankError> {
        ledger::post(
            &self.store,
            &self.txn_ids,
            account,
            TxnKind::Deposit,
            amount,
            date,
            detail,
        )
    }

    /// Withdraws `amount` from a savings account.
    ///
    /// # Errors
    ///
    /// As [`deposit`](Bank::deposit), plus [`BankError::InsufficientFunds`]
    /// when the amount exceeds the balance at commit time.
    pub fn withdraw(
        &self,
        account: AccountNumber,
        amount: Decimal,
        date: NaiveDate,
        detail: &str,
    ) -> Result<Receipt, BankError> {
        ledger::post(
            &self.store,
            &self.txn_ids,
            account,
            TxnKind::Withdraw,
            amount,
            date,
            detail,
        )
    }

    // === Queries ===

    pub fn account(&self, number: AccountNumber) -> Option<Account> {
        self.store.account(number)
    }

    /// Finds the account a customer holds for a (category, subtype) pair.
    ///
    /// The pair is normalized the same way provisioning normalizes it.
    pub fn find_account(
        &self,
        customer: CustomerId,
        category: &str,
        subtype: Option<&str>,
    ) -> Option<Account> {
        let (category, subtype) = crate::account::normalize_type_pair(category, subtype);
        let account_type = self.store.account_type_by_pair(&category, subtype.as_deref())?;
        let number = self.store.holding(customer, account_type.id)?;
        self.store.account(number)
    }

    pub fn account_type(&self, id: AccountTypeId) -> Option<AccountType> {
        self.store.account_type(id)
    }

    pub fn savings_detail(&self, number: AccountNumber) -> Option<SavingsDetail> {
        self.store.savings_detail(number)
    }

    pub fn loan_detail(&self, number: AccountNumber) -> Option<LoanDetail> {
        self.store.loan_detail(number)
    }

    /// Current balance of a savings account.
    pub fn balance(&self, number: AccountNumber) -> Option<Decimal> {
        self.store.savings_detail(number).map(|d| d.balance)
    }

    pub fn transaction(&self, id: TxnId) -> Option<Transaction> {
        self.store.transaction(id)
    }

    /// An account's transaction history in commit order.
    pub fn transactions(&self, number: AccountNumber) -> Vec<Transaction> {
        self.store.transactions_for(number)
    }

    /// All savings accounts with their detail rows, for reporting.
    pub fn savings_accounts(&self) -> Vec<(Account, SavingsDetail)> {
        self.store.savings_accounts()
    }

    /// Drains the global transaction journal in commit order.
    ///
    /// Consumes the order queue; meant for a final audit export, not for
    /// mid-flight reads.
    pub fn drain_journal(&self) -> Vec<Transaction> {
        self.store.drain_journal()
    }
}

impl Default for Bank {
    fn default() -> Self {
        Self::new()
    }
}
