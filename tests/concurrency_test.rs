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

//! Concurrency tests for the banking engine.
//!
//! Many threads hammer the same accounts and namespaces; the final state
//! must be exactly what the successful operations add up to, with no lost
//! updates, duplicate identifiers, or partial rows. A background deadlock
//! detector (parking_lot's `deadlock_detection` feature) watches the store's
//! internal locking the whole time.

use bank_ledger_rs::{
    AccountNumber, Bank, BankError, Customer, CustomerId, SavingsDetail,
};
use chrono::NaiveDate;
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Helpers ===

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn customer(id: u32) -> Customer {
    Customer {
        id: CustomerId(id),
        first_name: "Test".to_string(),
        last_name: "Customer".to_string(),
        email: format!("customer{}@example.com", id),
    }
}

fn savings_detail(balance: Decimal) -> SavingsDetail {
    SavingsDetail {
        balance,
        transfer_limit: dec!(100000.00),
        branch_code: "BR1".to_string(),
    }
}

fn bank_with_savings(opening: Decimal) -> (Arc<Bank>, AccountNumber) {
    let bank = Arc::new(Bank::new());
    bank.register_customer(customer(1)).unwrap();
    let account = bank
        .open_savings(CustomerId(1), "Savings", None, savings_detail(opening), date())
        .unwrap();
    (bank, account.number)
}

/// Posts a deposit, retrying transient failures the way a real caller
/// would. Under heavy contention the optimistic commit loop may exhaust its
/// in-process budget and surface `TransactionConflict`; that is an expected
/// outcome, not a bug, so the test retries it.
fn deposit_retrying(bank: &Bank, number: AccountNumber, amount: Decimal) {
    loop {
        match bank.deposit(number, amount, date(), "") {
            Ok(_) => return,
            Err(e) if e.is_transient() => continue,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}

/// Withdraws with the same retry policy; returns whether the withdrawal
/// ultimately applied (false on insufficient funds).
fn withdraw_retrying(bank: &Bank, number: AccountNumber, amount: Decimal) -> bool {
    loop {
        match bank.withdraw(number, amount, date(), "") {
            Ok(_) => return true,
            Err(BankError::InsufficientFunds) => return false,
            Err(e) if e.is_transient() => continue,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}

/// Checks that an account's history forms a consistent running-balance
/// chain ending at the current balance.
fn assert_consistent_history(bank: &Bank, number: AccountNumber) {
    let mut running = Decimal::ZERO;
    for txn in bank.transactions(number) {
        running += txn.signed_amount();
        assert_eq!(
            txn.balance, running,
            "transaction {} is not a consistent snapshot",
            txn.id
        );
    }
    assert_eq!(bank.balance(number), Some(running));
}

// === Tests ===

/// Two concurrent deposits of 10.00 and 20.00 on a zero balance end at
/// exactly 30.00, with both rows self-consistent in commit order.
#[test]
fn two_concurrent_deposits_linearize() {
    let detector = start_deadlock_detector();
    let (bank, number) = bank_with_savings(Decimal::ZERO);

    let handles: Vec<_> = [dec!(10.00), dec!(20.00)]
        .into_iter()
        .map(|amount| {
            let bank = bank.clone();
            thread::spawn(move || bank.deposit(number, amount, date(), "concurrent").unwrap())
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(bank.balance(number), Some(dec!(30.00)));
    let history = bank.transactions(number);
    assert_eq!(history.len(), 2);
    assert_consistent_history(&bank, number);

    // Whichever committed second carries the final balance.
    assert_eq!(history[1].balance, dec!(30.00));
}

/// High-contention deposits from many threads sum exactly.
#[test]
fn concurrent_deposits_sum_exactly() {
    let detector = start_deadlock_detector();
    let (bank, number) = bank_with_savings(Decimal::ZERO);

    const NUM_THREADS: usize = 8;
    const DEPOSITS_PER_THREAD: usize = 50;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let bank = bank.clone();
            thread::spawn(move || {
                for _ in 0..DEPOSITS_PER_THREAD {
                    deposit_retrying(&bank, number, dec!(1.25));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let expected = dec!(1.25) * Decimal::from((NUM_THREADS * DEPOSITS_PER_THREAD) as u64);
    assert_eq!(bank.balance(number), Some(expected));
    assert_eq!(bank.transactions(number).len(), NUM_THREADS * DEPOSITS_PER_THREAD);
    assert_consistent_history(&bank, number);
}

/// Mixed concurrent deposits and withdrawals conserve money: the final
/// balance is the opening balance plus successful deposits minus successful
/// withdrawals, and never went negative.
#[test]
fn concurrent_mixed_operations_conserve_money() {
    let detector = start_deadlock_detector();
    let (bank, number) = bank_with_savings(dec!(100.00));

    const NUM_THREADS: usize = 10;
    const OPS_PER_THREAD: usize = 40;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|thread_id| {
            let bank = bank.clone();
            thread::spawn(move || {
                let mut deposited = Decimal::ZERO;
                let mut withdrawn = Decimal::ZERO;
                for i in 0..OPS_PER_THREAD {
                    if (thread_id + i) % 2 == 0 {
                        deposit_retrying(&bank, number, dec!(3.00));
                        deposited += dec!(3.00);
                    } else if withdraw_retrying(&bank, number, dec!(5.00)) {
                        withdrawn += dec!(5.00);
                    }
                }
                (deposited, withdrawn)
            })
        })
        .collect();

    let mut total_deposited = Decimal::ZERO;
    let mut total_withdrawn = Decimal::ZERO;
    for handle in handles {
        let (deposited, withdrawn) = handle.join().expect("Thread panicked");
        total_deposited += deposited;
        total_withdrawn += withdrawn;
    }

    stop_deadlock_detector(detector);

    let expected = dec!(100.00) + total_deposited - total_withdrawn;
    assert_eq!(bank.balance(number), Some(expected));
    assert!(expected >= Decimal::ZERO);
    assert_consistent_history(&bank, number);
}

/// Concurrent withdrawals can never overdraw, even when every attempt is
/// individually covered by the opening balance.
#[test]
fn concurrent_withdrawals_never_overdraw() {
    let detector = start_deadlock_detector();
    // Ten withdrawals of 10.00 would need 100.00; only 55.00 is there.
    let (bank, number) = bank_with_savings(dec!(55.00));

    const NUM_THREADS: usize = 10;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let bank = bank.clone();
            thread::spawn(move || withdraw_retrying(&bank, number, dec!(10.00)))
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|ok| *ok)
        .count();

    stop_deadlock_detector(detector);

    // 55.00 covers exactly five withdrawals of 10.00.
    assert_eq!(successes, 5);
    assert_eq!(bank.balance(number), Some(dec!(5.00)));
    assert_consistent_history(&bank, number);
}

/// Opening the same (customer, type) pair from many threads creates exactly
/// one account.
#[test]
fn concurrent_opens_of_same_pair_create_one_account() {
    let detector = start_deadlock_detector();
    let bank = Arc::new(Bank::new());
    bank.register_customer(customer(1)).unwrap();

    const NUM_THREADS: usize = 12;

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let bank = bank.clone();
            thread::spawn(move || {
                bank.open_savings(
                    CustomerId(1),
                    "Savings",
                    Some("Regular"),
                    savings_detail(Decimal::ZERO),
                    date(),
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect();

    stop_deadlock_detector(detector);

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one open should win");

    for result in &results {
        match result {
            Ok(_) => {}
            Err(BankError::DuplicateAccount) | Err(BankError::AccountConflict) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(bank.savings_accounts().len(), 1);
}

/// Concurrent opens for distinct customers all succeed with unique 9-digit
/// account numbers.
#[test]
fn concurrent_opens_allocate_unique_numbers() {
    let detector = start_deadlock_detector();
    let bank = Arc::new(Bank::new());

    const NUM_CUSTOMERS: u32 = 50;
    for id in 1..=NUM_CUSTOMERS {
        bank.register_customer(customer(id)).unwrap();
    }

    let handles: Vec<_> = (1..=NUM_CUSTOMERS)
        .map(|id| {
            let bank = bank.clone();
            thread::spawn(move || {
                bank.open_savings(
                    CustomerId(id),
                    "Savings",
                    None,
                    savings_detail(Decimal::ZERO),
                    date(),
                )
                .unwrap()
                .number
            })
        })
        .collect();

    let numbers: Vec<AccountNumber> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect();

    stop_deadlock_detector(detector);

    let unique: HashSet<_> = numbers.iter().collect();
    assert_eq!(unique.len(), NUM_CUSTOMERS as usize);
    for number in &numbers {
        assert!((100_000_000..=999_999_999).contains(&number.0), "got {}", number);
    }
}

/// Concurrent posting across several accounts keeps every account's ledger
/// independent and consistent.
#[test]
fn cross_account_posts_stay_isolated() {
    let detector = start_deadlock_detector();
    let bank = Arc::new(Bank::new());

    const NUM_ACCOUNTS: u32 = 5;
    const DEPOSITS_PER_ACCOUNT: usize = 30;

    let mut numbers = Vec::new();
    for id in 1..=NUM_ACCOUNTS {
        bank.register_customer(customer(id)).unwrap();
        let account = bank
            .open_savings(CustomerId(id), "Savings", None, savings_detail(Decimal::ZERO), date())
            .unwrap();
        numbers.push(account.number);
    }

    let handles: Vec<_> = numbers
        .iter()
        .flat_map(|&number| {
            (0..2).map(move |_| number) // two threads per account
        })
        .map(|number| {
            let bank = bank.clone();
            thread::spawn(move || {
                for _ in 0..DEPOSITS_PER_ACCOUNT / 2 {
                    deposit_retrying(&bank, number, dec!(2.00));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let expected = dec!(2.00) * Decimal::from(DEPOSITS_PER_ACCOUNT as u64);
    for number in numbers {
        assert_eq!(bank.balance(number), Some(expected));
        assert_eq!(bank.transactions(number).len(), DEPOSITS_PER_ACCOUNT);
        assert_consistent_history(&bank, number);
    }
}
