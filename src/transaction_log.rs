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

//! Append-only transaction log with id-uniqueness enforcement.
//!
//! This is the "transaction ids" namespace: an append either reserves a
//! never-seen id together with its row, or reports the collision so the
//! caller can draw a fresh id.

use crate::base::TxnId;
use crate::transaction::Transaction;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Thread-safe append-only transaction log.
///
/// Combines a [`DashMap`] for O(1) id-collision detection with a [`SegQueue`]
/// preserving global append order, so the journal can be exported in the
/// order transactions actually committed.
#[derive(Debug)]
pub struct TransactionLog {
    /// Rows indexed by transaction id; doubles as the uniqueness namespace.
    rows: DashMap<TxnId, Transaction>,

    /// Transaction ids in append (commit) order.
    order: SegQueue<TxnId>,
}

impl TransactionLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            order: SegQueue::new(),
        }
    }

    /// Appends a row if its id is unreserved.
    ///
    /// Returns `false` when the id is already taken, leaving the log
    /// untouched. Uses the entry API so check-and-insert is atomic under
    /// concurrent appends.
    pub fn try_append(&self, txn: Transaction) -> bool {
        match self.rows.entry(txn.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                let id = txn.id;
                entry.insert(txn);
                self.order.push(id);
                true
            }
        }
    }

    /// Removes a staged row before it became observable.
    ///
    /// Only for rolling back a reservation whose owning record failed to
    /// materialize; committed rows are never removed.
    pub(crate) fn revoke(&self, id: TxnId) {
        self.rows.remove(&id);
    }

    pub fn get(&self, id: TxnId) -> Option<Transaction> {
        self.rows.get(&id).map(|row| row.clone())
    }

    pub fn contains(&self, id: TxnId) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drains the journal, returning rows in commit order.
    ///
    /// Ids whose rows were revoked before publication are skipped.
    pub fn drain_in_order(&self) -> Vec<Transaction> {
        let mut journal = Vec::with_capacity(self.order.len());
        while let Some(id) = self.order.pop() {
            if let Some(row) = self.rows.get(&id) {
                journal.push(row.clone());
            }
        }
        journal
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::AccountNumber;
    use crate::transaction::TxnKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn txn(id: u64, amount: rust_decimal::Decimal) -> Transaction {
        Transaction::new(
            TxnId(id),
            AccountNumber(100_000_001),
            TxnKind::Deposit,
            amount,
            NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            "test",
            amount,
        )
    }

    #[test]
    fn append_then_get() {
        let log = TransactionLog::new();
        assert!(log.try_append(txn(1, dec!(10.00))));
        assert!(log.contains(TxnId(1)));
        assert_eq!(log.get(TxnId(1)).unwrap().deposit_amount, dec!(10.00));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let log = TransactionLog::new();
        assert!(log.try_append(txn(7, dec!(10.00))));
        assert!(!log.try_append(txn(7, dec!(99.00))));

        // Original row is untouched.
        assert_eq!(log.get(TxnId(7)).unwrap().deposit_amount, dec!(10.00));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn revoked_rows_disappear() {
        let log = TransactionLog::new();
        assert!(log.try_append(txn(5, dec!(10.00))));
        log.revoke(TxnId(5));
        assert!(!log.contains(TxnId(5)));

        // The id can be reserved again afterwards.
        assert!(log.try_append(txn(5, dec!(20.00))));
    }

    #[test]
    fn drain_preserves_append_order() {
        let log = TransactionLog::new();
        for id in [3u64, 1, 2] {
            assert!(log.try_append(txn(id, dec!(1.00))));
        }

        let journal = log.drain_in_order();
        let ids: Vec<u64> = journal.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
