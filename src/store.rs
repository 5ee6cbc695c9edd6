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

//! In-memory relational store.
//!
//! Stands in for the backing database, exposing the three primitives the
//! engine coordinates through:
//!
//! - insert with uniqueness-violation detection (customers, account numbers,
//!   per-customer holdings, detail rows, transaction ids),
//! - point reads by exact key,
//! - [`commit_savings_txn`]: a compare-and-commit that applies a balance
//!   update and appends the matching transaction row as one unit.
//!
//! Rows carry a commit `version`; callers snapshot `(balance, version)`,
//! compute outside any lock, and commit against the snapshotted version.
//! A concurrent writer bumps the version and the late committer observes
//! [`CommitError::StaleBalance`]. No lock is ever held by callers across
//! their read-compute-commit cycle.
//!
//! [`commit_savings_txn`]: MemoryStore::commit_savings_txn

use crate::account::{Account, AccountType, Customer, LoanDetail, SavingsDetail};
use crate::base::{AccountNumber, AccountTypeId, CustomerId, TxnId};
use crate::error::BankError;
use crate::transaction::Transaction;
use crate::transaction_log::TransactionLog;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// Failure modes of [`MemoryStore::commit_savings_txn`].
///
/// The engine treats these differently: an id collision consumes allocator
/// retries, a stale balance consumes conflict retries, a missing account is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitError {
    /// The transaction id is already reserved; draw a fresh one.
    TxnIdTaken,
    /// A concurrent writer committed first; re-read and recompute.
    StaleBalance,
    /// No savings row exists for the account.
    AccountMissing,
}

/// Savings row as stored: detail fields plus concurrency metadata.
#[derive(Debug)]
struct SavingsRow {
    detail: SavingsDetail,
    /// Bumped on every committed transaction; the compare half of
    /// compare-and-commit.
    version: u64,
    /// Transaction ids for this account in commit order.
    history: Vec<TxnId>,
}

/// In-memory store backing a [`Bank`](crate::Bank).
#[derive(Debug, Default)]
pub struct MemoryStore {
    customers: DashMap<CustomerId, Customer>,
    /// Account-type pairs with sequentially assigned ids.
    account_types: RwLock<Vec<AccountType>>,
    /// Account rows; the key set is the account-number namespace.
    accounts: DashMap<AccountNumber, Account>,
    /// Enforces at most one account per (customer, account-type).
    holdings: DashMap<(CustomerId, AccountTypeId), AccountNumber>,
    savings: DashMap<AccountNumber, SavingsRow>,
    loans: DashMap<AccountNumber, LoanDetail>,
    transactions: TransactionLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Customers ===

    /// Registers a customer with a not-yet-used id.
    pub fn insert_customer(&self, customer: Customer) -> Result<(), BankError> {
        match self.customers.entry(customer.id) {
            Entry::Occupied(_) => Err(BankError::DuplicateCustomer),
            Entry::Vacant(entry) => {
                entry.insert(customer);
                Ok(())
            }
        }
    }

    pub fn customer_exists(&self, id: CustomerId) -> bool {
        self.customers.contains_key(&id)
    }

    pub fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.customers.get(&id).map(|c| c.clone())
    }

    // === Account types ===

    /// Looks up the (category, subtype) pair, creating it on first use.
    ///
    /// Expects normalized strings (see
    /// [`normalize_type_pair`](crate::account::normalize_type_pair));
    /// matching is exact, an absent subtype matches only an absent subtype.
    pub fn find_or_create_account_type(
        &self,
        category: &str,
        subtype: Option<&str>,
    ) -> AccountType {
        let mut types = self.account_types.write();
        if let Some(existing) = types.iter().find(|at| at.matches(category, subtype)) {
            return existing.clone();
        }

        let created = AccountType {
            id: AccountTypeId(types.len() as u32 + 1),
            category: category.to_string(),
            subtype: subtype.map(str::to_string),
        };
        types.push(created.clone());
        created
    }

    pub fn account_type(&self, id: AccountTypeId) -> Option<AccountType> {
        self.account_types
            .read()
            .iter()
            .find(|at| at.id == id)
            .cloned()
    }

    /// Looks up a pair without creating it. Expects normalized strings.
    pub fn account_type_by_pair(&self, category: &str, subtype: Option<&str>) -> Option<AccountType> {
        self.account_types
            .read()
            .iter()
            .find(|at| at.matches(category, subtype))
            .cloned()
    }

    // === Accounts & holdings ===

    /// Inserts an account row, failing on an account-number collision.
    pub fn try_insert_account(&self, account: Account) -> bool {
        match self.accounts.entry(account.number) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(account);
                true
            }
        }
    }

    /// Rolls back an account row whose provisioning did not complete.
    pub(crate) fn remove_account(&self, number: AccountNumber) {
        self.accounts.remove(&number);
    }

    pub fn account(&self, number: AccountNumber) -> Option<Account> {
        self.accounts.get(&number).map(|a| *a)
    }

    /// Atomically reserves the (customer, account-type) holding slot.
    ///
    /// Returns `false` when the customer already holds (or a concurrent
    /// request is creating) an account of this type.
    pub fn try_reserve_holding(
        &self,
        customer: CustomerId,
        account_type: AccountTypeId,
        number: AccountNumber,
    ) -> bool {
        match self.holdings.entry((customer, account_type)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(number);
                true
            }
        }
    }

    pub(crate) fn release_holding(&self, customer: CustomerId, account_type: AccountTypeId) {
        self.holdings.remove(&(customer, account_type));
    }

    pub fn holding(&self, customer: CustomerId, account_type: AccountTypeId) -> Option<AccountNumber> {
        self.holdings.get(&(customer, account_type)).map(|n| *n)
    }

    // === Detail rows ===

    /// Inserts the savings detail row, optionally seeded with an opening
    /// transaction already staged in the log.
    pub fn insert_savings_detail(
        &self,
        number: AccountNumber,
        detail: SavingsDetail,
        opening_txn: Option<TxnId>,
    ) -> Result<(), BankError> {
        match self.savings.entry(number) {
            Entry::Occupied(_) => Err(BankError::AccountConflict),
            Entry::Vacant(entry) => {
                entry.insert(SavingsRow {
                    detail,
                    version: 0,
                    history: opening_txn.into_iter().collect(),
                });
                Ok(())
            }
        }
    }

    pub fn insert_loan_detail(
        &self,
        number: AccountNumber,
        detail: LoanDetail,
    ) -> Result<(), BankError> {
        match self.loans.entry(number) {
            Entry::Occupied(_) => Err(BankError::AccountConflict),
            Entry::Vacant(entry) => {
                entry.insert(detail);
                Ok(())
            }
        }
    }

    pub fn savings_detail(&self, number: AccountNumber) -> Option<SavingsDetail> {
        self.savings.get(&number).map(|row| row.detail.clone())
    }

    pub fn loan_detail(&self, number: AccountNumber) -> Option<LoanDetail> {
        self.loans.get(&number).map(|d| d.clone())
    }

    /// All savings accounts with their detail rows, for reporting.
    pub fn savings_accounts(&self) -> Vec<(Account, SavingsDetail)> {
        self.savings
            .iter()
            .filter_map(|row| {
                self.account(*row.key())
                    .map(|account| (account, row.detail.clone()))
            })
            .collect()
    }

    // === Ledger commit unit ===

    /// Point read of `(balance, version)` for optimistic posting.
    pub fn savings_snapshot(&self, number: AccountNumber) -> Option<(Decimal, u64)> {
        self.savings
            .get(&number)
            .map(|row| (row.detail.balance, row.version))
    }

    /// Commits a transaction against the balance version it was computed
    /// from.
    ///
    /// On success the balance update, version bump, history append, and
    /// transaction-row insert become visible together; on any error nothing
    /// is changed.
    pub fn commit_savings_txn(
        &self,
        expected_version: u64,
        txn: Transaction,
    ) -> Result<(), CommitError> {
        let mut row = self
            .savings
            .get_mut(&txn.account)
            .ok_or(CommitError::AccountMissing)?;

        if row.version != expected_version {
            return Err(CommitError::StaleBalance);
        }

        let id = txn.id;
        let balance = txn.balance;
        if !self.transactions.try_append(txn) {
            return Err(CommitError::TxnIdTaken);
        }

        row.detail.balance = balance;
        row.version += 1;
        row.history.push(id);
        Ok(())
    }

    // === Transactions ===

    /// Stages a transaction row outside the commit unit (opening deposits).
    pub fn try_append_transaction(&self, txn: Transaction) -> bool {
        self.transactions.try_append(txn)
    }

    /// Rolls back a staged transaction whose owning account never
    /// materialized.
    pub(crate) fn revoke_transaction(&self, id: TxnId) {
        self.transactions.revoke(id);
    }

    pub fn transaction(&self, id: TxnId) -> Option<Transaction> {
        self.transactions.get(id)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// An account's transaction history in commit order.
    pub fn transactions_for(&self, number: AccountNumber) -> Vec<Transaction> {
        let ids = match self.savings.get(&number) {
            Some(row) => row.history.clone(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| self.transactions.get(id))
            .collect()
    }

    /// Drains the global journal in commit order.
    pub fn drain_journal(&self) -> Vec<Transaction> {
        self.transactions.drain_in_order()
    }
}
