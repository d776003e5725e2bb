// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Trip Ledger Contributors
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

//! Transactional booking store.
//!
//! Bookings for different ids are fully independent; operations on the same
//! booking are serialized by a per-booking mutex. The whole guard-and-write
//! sequence of a confirmation runs inside [`BookingStore::with_booking`] as
//! one atomic unit, so a failed guard never leaves partial state behind.
//!
//! Lock acquisition is bounded: if the mutex cannot be taken within the
//! deadline after a bounded number of attempts, the operation fails with a
//! retryable internal error and no effects.

use crate::base::BookingId;
use crate::booking::{Booking, BookingStatus};
use crate::error::ProtocolError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("booking {0} already exists")]
    DuplicateBooking(BookingId),
}

#[derive(Debug)]
struct BookingCell {
    inner: Mutex<Booking>,
}

/// Concurrent document store for bookings.
#[derive(Debug, Default)]
pub struct BookingStore {
    cells: DashMap<BookingId, Arc<BookingCell>>,
}

impl BookingStore {
    pub fn new() -> Self {
        BookingStore {
            cells: DashMap::new(),
        }
    }

    /// Inserts a new booking. Booking ids are unique; re-inserting is a
    /// caller bug, not an upsert.
    pub fn insert(&self, booking: Booking) -> Result<(), StoreError> {
        use dashmap::mapref::entry::Entry;
        match self.cells.entry(booking.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateBooking(booking.id)),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(BookingCell {
                    inner: Mutex::new(booking),
                }));
                Ok(())
            }
        }
    }

    fn cell(&self, id: &BookingId) -> Option<Arc<BookingCell>> {
        // Clone the Arc out so the map shard is released before we block on
        // the booking mutex.
        self.cells.get(id).map(|cell| Arc::clone(&cell))
    }

    /// Runs `f` with exclusive access to the booking: the atomic
    /// read-modify-write unit behind every transition.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::NotFound`] if the booking does not exist.
    /// - [`ProtocolError::Internal`] (retryable) if the lock cannot be
    ///   acquired within `lock_timeout` across `lock_attempts` tries.
    /// - Whatever `f` returns; the booking is left untouched by this method
    ///   on failure (guards in `f` must not mutate before the final write).
    pub fn with_booking<T>(
        &self,
        id: &BookingId,
        lock_timeout: Duration,
        lock_attempts: u32,
        f: impl FnOnce(&mut Booking) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let cell = self.cell(id).ok_or_else(|| ProtocolError::NotFound(id.clone()))?;

        let mut attempts = 0;
        let mut guard = loop {
            if let Some(guard) = cell.inner.try_lock_for(lock_timeout) {
                break guard;
            }
            attempts += 1;
            if attempts >= lock_attempts.max(1) {
                warn!(booking = %id, attempts, "booking lock acquisition timed out");
                return Err(ProtocolError::Internal { retryable: true });
            }
        };

        f(&mut guard)
    }

    /// Point-in-time copy of a booking.
    pub fn snapshot(&self, id: &BookingId) -> Option<Booking> {
        self.cell(id).map(|cell| cell.inner.lock().clone())
    }

    /// Ids of all bookings currently in `status`. The result is a snapshot;
    /// callers re-validate under the booking lock.
    pub fn ids_with_status(&self, status: BookingStatus) -> Vec<BookingId> {
        self.cells
            .iter()
            .filter(|entry| entry.value().inner.lock().status == status)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// All booking ids, unordered.
    pub fn ids(&self) -> Vec<BookingId> {
        self.cells.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
