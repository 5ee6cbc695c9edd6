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

//! Random fixed-width identifier allocation with bounded retry.
//!
//! Account numbers and transaction ids are drawn uniformly at random from
//! the full fixed-width range instead of being handed out by a sequence.
//! Uniqueness is enforced by the store at reservation time; a collision just
//! means drawing again. With a 9-digit space (~9×10^8 values) collisions are
//! rare at realistic fill levels, so the retry bound exists to cap worst-case
//! latency, not because collisions are expected.

use crate::BankError;
use rand::Rng;

/// Allocator for one identifier namespace.
///
/// The allocator only draws candidates and drives the retry loop; the claim
/// callback is responsible for durably reserving the candidate together with
/// the record that owns it, so a reserved id can never outlive its record.
#[derive(Debug, Clone, Copy)]
pub struct IdAllocator {
    width: u32,
    max_retries: u32,
}

impl IdAllocator {
    /// Creates an allocator for ids of exactly `width` decimal digits,
    /// giving up after `max_retries` consecutive collisions.
    pub const fn new(width: u32, max_retries: u32) -> Self {
        Self { width, max_retries }
    }

    /// Number of decimal digits in every id this allocator produces.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Draws a candidate with exactly `width` digits (no leading zero).
    pub fn candidate(&self) -> u64 {
        let low = 10u64.pow(self.width - 1);
        let high = 10u64.pow(self.width) - 1;
        rand::thread_rng().gen_range(low..=high)
    }

    /// Draws candidates until `claim` reserves one, up to the retry bound.
    ///
    /// `claim` is invoked with a fresh candidate on every attempt and must
    /// return:
    ///
    /// - `Ok(Some(value))` - the candidate was reserved as part of creating
    ///   its owning record; `value` is returned to the caller.
    /// - `Ok(None)` - the candidate was already taken; a new one is drawn.
    ///   Any state the claim read must be re-read on the next attempt, which
    ///   happens naturally because the whole closure runs again.
    /// - `Err(e)` - a non-collision failure; surfaced immediately without
    ///   consuming the retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`BankError::AllocationExhausted`] after `max_retries`
    /// consecutive collisions.
    pub fn allocate<T, F>(&self, mut claim: F) -> Result<T, BankError>
    where
        F: FnMut(u64) -> Result<Option<T>, BankError>,
    {
        for attempt in 0..self.max_retries {
            let candidate = self.candidate();
            match claim(candidate)? {
                Some(value) => return Ok(value),
                None => {
                    log::debug!(
                        "id {} already taken (attempt {}/{})",
                        candidate,
                        attempt + 1,
                        self.max_retries
                    );
                }
            }
        }

        log::warn!(
            "identifier allocation exhausted after {} attempts",
            self.max_retries
        );
        Err(BankError::AllocationExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn candidates_have_exact_width() {
        let allocator = IdAllocator::new(9, 5);
        for _ in 0..1000 {
            let id = allocator.candidate();
            assert!((100_000_000..=999_999_999).contains(&id), "got {}", id);
        }
    }

    #[test]
    fn width_applies_to_other_sizes() {
        let allocator = IdAllocator::new(4, 5);
        for _ in 0..1000 {
            let id = allocator.candidate();
            assert!((1000..=9999).contains(&id), "got {}", id);
        }
    }

    #[test]
    fn allocate_returns_first_unclaimed() {
        let allocator = IdAllocator::new(9, 5);
        let mut reserved = HashSet::new();

        let id = allocator
            .allocate(|candidate| {
                if reserved.insert(candidate) {
                    Ok(Some(candidate))
                } else {
                    Ok(None)
                }
            })
            .unwrap();

        assert!(reserved.contains(&id));
    }

    #[test]
    fn allocate_retries_on_collision() {
        let allocator = IdAllocator::new(9, 5);
        let mut calls = 0;

        let id = allocator.allocate(|candidate| {
            calls += 1;
            // First two candidates are "taken".
            if calls <= 2 { Ok(None) } else { Ok(Some(candidate)) }
        });

        assert!(id.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn allocate_exhausts_after_bound() {
        let allocator = IdAllocator::new(9, 3);
        let mut calls = 0;

        let result: Result<u64, _> = allocator.allocate(|_| {
            calls += 1;
            Ok(None)
        });

        assert_eq!(result, Err(BankError::AllocationExhausted));
        assert_eq!(calls, 3);
    }

    #[test]
    fn allocate_aborts_on_error_without_retrying() {
        let allocator = IdAllocator::new(9, 5);
        let mut calls = 0;

        let result: Result<u64, _> = allocator.allocate(|_| {
            calls += 1;
            Err(BankError::InsufficientFunds)
        });

        assert_eq!(result, Err(BankError::InsufficientFunds));
        assert_eq!(calls, 1);
    }
}
