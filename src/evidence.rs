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

//! Evidence gate: "does the required proof-of-condition media exist?"
//!
//! The gate answers existence questions only; media content never flows
//! through this crate. Object paths are a pure function of booking id and
//! artifact kind, so an adapter over any object store can implement
//! [`EvidenceGate`] by key lookup.

use crate::base::BookingId;
use dashmap::DashSet;
use serde::Serialize;
use thiserror::Error;

/// Kinds of proof-of-condition artifacts gathered during a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Host's walkaround video before handover.
    HostStartVideo,
    /// Renter's walkaround video before handover.
    RenterStartVideo,
    /// Host's numbered damage photo at the end of the rental (1-indexed).
    DamagePhoto(u32),
    /// Host's return condition video at completion.
    ReturnVideo,
}

/// Canonical object-store path for an artifact. Pure function; adapters and
/// uploaders must agree on these exact paths.
pub fn object_path(booking_id: &BookingId, kind: ArtifactKind) -> String {
    match kind {
        ArtifactKind::HostStartVideo => format!("bookings/{booking_id}/start/host_walkaround.mp4"),
        ArtifactKind::RenterStartVideo => {
            format!("bookings/{booking_id}/start/renter_walkaround.mp4")
        }
        ArtifactKind::DamagePhoto(n) => format!("bookings/{booking_id}/end/host/photo_{n}.jpg"),
        ArtifactKind::ReturnVideo => format!("bookings/{booking_id}/host_return_video.mp4"),
    }
}

/// Directory prefix holding a booking's damage photos.
pub fn damage_photo_prefix(booking_id: &BookingId) -> String {
    format!("bookings/{booking_id}/end/host/")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    /// The backing object store could not be reached or answered garbage.
    #[error("evidence store unavailable: {0}")]
    StoreUnavailable(String),
}

/// External check for required proof-of-condition media.
///
/// Implementations are adapters over an object store. The engine consults
/// the gate on every confirmation with an evidence requirement and never
/// bypasses it, including for the second confirming actor.
pub trait EvidenceGate: Send + Sync {
    /// Whether the canonical artifact exists.
    fn exists(&self, booking_id: &BookingId, kind: ArtifactKind) -> Result<bool, EvidenceError>;

    /// Number of damage photos present for the booking.
    fn damage_photo_count(&self, booking_id: &BookingId) -> Result<u32, EvidenceError>;
}

/// Path-set backed gate used by tests and the replay CLI, and as the
/// reference for what a real object-store adapter must answer.
#[derive(Debug, Default)]
pub struct InMemoryEvidenceStore {
    paths: DashSet<String>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        InMemoryEvidenceStore {
            paths: DashSet::new(),
        }
    }

    /// Marks the canonical artifact as uploaded.
    pub fn put(&self, booking_id: &BookingId, kind: ArtifactKind) {
        self.paths.insert(object_path(booking_id, kind));
    }

    /// Adds the next numbered damage photo and returns its number.
    pub fn put_damage_photo(&self, booking_id: &BookingId) -> u32 {
        let next = self.count_damage_photos(booking_id) + 1;
        self.put(booking_id, ArtifactKind::DamagePhoto(next));
        next
    }

    fn count_damage_photos(&self, booking_id: &BookingId) -> u32 {
        let prefix = damage_photo_prefix(booking_id);
        self.paths
            .iter()
            .filter(|path| {
                path.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_prefix("photo_"))
                    .and_then(|rest| rest.strip_suffix(".jpg"))
                    .is_some_and(|n| n.parse::<u32>().is_ok())
            })
            .count() as u32
    }
}

impl EvidenceGate for InMemoryEvidenceStore {
    fn exists(&self, booking_id: &BookingId, kind: ArtifactKind) -> Result<bool, EvidenceError> {
        Ok(self.paths.contains(&object_path(booking_id, kind)))
    }

    fn damage_photo_count(&self, booking_id: &BookingId) -> Result<u32, EvidenceError> {
        Ok(self.count_damage_photos(booking_id))
    }
}
