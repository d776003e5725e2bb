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

//! Append-only, idempotent transaction ledger.
//!
//! Every phase transition is recorded exactly once under a deterministic key
//! derived from `(booking id, entry type)`. The key derivation is the sole
//! idempotency mechanism of the whole system: retries, duplicate client
//! calls, and concurrent invocations all collapse onto the same key, and the
//! map's atomic create-if-absent primitive guarantees at most one entry is
//! ever materialized. Existence of the entry — not the booking's own status
//! field — is the source of truth for "has this phase already happened".
//!
//! Any reimplementation must reproduce the canonical string form
//! `{booking_id}_{entry_type}` to stay compatible with existing ledger rows.

use crate::base::{BookingId, UserId};
use crate::settlement::Settlement;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Types of ledger entries written during the booking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    BookingStarted,
    BookingEnded,
    BookingCompleted,
    FundsReceived,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::BookingStarted => "booking_started",
            EntryType::BookingEnded => "booking_ended",
            EntryType::BookingCompleted => "booking_completed",
            EntryType::FundsReceived => "funds_received",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who an entry is attributed to.
///
/// `System` marks transitions finalized by the engine itself, whether both
/// parties confirmed or the scheduled sweep forced completion. `Admin` marks
/// a manual privileged override and records who performed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum LedgerActor {
    System,
    Admin(UserId),
}

impl fmt::Display for LedgerActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerActor::System => f.write_str("system"),
            LedgerActor::Admin(uid) => write!(f, "admin:{uid}"),
        }
    }
}

/// Deterministic ledger key. One entry per (booking, type) pair, ever.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub booking_id: BookingId,
    pub entry_type: EntryType,
}

impl LedgerKey {
    pub fn new(booking_id: BookingId, entry_type: EntryType) -> Self {
        LedgerKey {
            booking_id,
            entry_type,
        }
    }

    /// Canonical string form, `{booking_id}_{entry_type}`. Must match the
    /// historical derivation exactly.
    pub fn canonical(&self) -> String {
        format!("{}_{}", self.booking_id, self.entry_type)
    }
}

/// Immutable, append-only transaction record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub booking_id: BookingId,
    pub entry_type: EntryType,
    pub actor: LedgerActor,
    pub created_at: DateTime<Utc>,
    pub renter_id: UserId,
    pub owner_id: UserId,
    /// Present only on `FundsReceived` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
}

impl LedgerEntry {
    /// Canonical id of this entry.
    pub fn id(&self) -> String {
        LedgerKey::new(self.booking_id.clone(), self.entry_type).canonical()
    }
}

/// Outcome of an idempotent create.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// This call materialized the entry.
    Created(Arc<LedgerEntry>),
    /// A concurrent or earlier creator won; the phase has already happened.
    /// This is "already done", not an error to propagate.
    AlreadyExists(Arc<LedgerEntry>),
}

impl CreateOutcome {
    pub fn entry(&self) -> &Arc<LedgerEntry> {
        match self {
            CreateOutcome::Created(e) | CreateOutcome::AlreadyExists(e) => e,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Thread-safe append-only ledger with deterministic-key deduplication.
///
/// A [`DashMap`] gives O(1) atomic create-if-absent; a mutex-guarded key
/// vector records insertion order for listing. Readers clone the key list
/// and never mutate it, so concurrent listings always see every committed
/// entry. There is no update or delete path by construction.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: DashMap<LedgerKey, Arc<LedgerEntry>>,
    order: Mutex<Vec<LedgerKey>>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            entries: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Creates the entry if absent. Safe to call concurrently for the same
    /// key: exactly one caller observes [`CreateOutcome::Created`].
    pub fn create(&self, entry: LedgerEntry) -> CreateOutcome {
        let key = LedgerKey::new(entry.booking_id.clone(), entry.entry_type);

        match self.entries.entry(key.clone()) {
            Entry::Occupied(existing) => CreateOutcome::AlreadyExists(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                let entry = Arc::new(entry);
                vacant.insert(Arc::clone(&entry));
                self.order.lock().push(key);
                CreateOutcome::Created(entry)
            }
        }
    }

    pub fn exists(&self, booking_id: &BookingId, entry_type: EntryType) -> bool {
        self.entries
            .contains_key(&LedgerKey::new(booking_id.clone(), entry_type))
    }

    pub fn get(&self, booking_id: &BookingId, entry_type: EntryType) -> Option<Arc<LedgerEntry>> {
        self.entries
            .get(&LedgerKey::new(booking_id.clone(), entry_type))
            .map(|e| Arc::clone(&e))
    }

    /// All entries for one booking, in insertion order.
    pub fn for_booking(&self, booking_id: &BookingId) -> Vec<Arc<LedgerEntry>> {
        self.iter_ordered()
            .filter(|e| &e.booking_id == booking_id)
            .collect()
    }

    /// All entries in insertion order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = Arc<LedgerEntry>> + '_ {
        let keys = self.order.lock().clone();
        keys.into_iter()
            .filter_map(|key| self.entries.get(&key).map(|e| Arc::clone(&e)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
