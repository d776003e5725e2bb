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

//! Phase descriptors for the confirmation protocol.
//!
//! The guard sequence (auth → state → duplicate → time → evidence → merge →
//! maybe-transition → ledger) is structurally identical for start, end, and
//! completion. One transition executor in [`crate::engine`] runs it, keyed by
//! the descriptor data here: required predecessor statuses, terminal status,
//! ledger entry type, temporal boundary, and per-actor evidence requirement.

use crate::booking::{Booking, BookingStatus};
use crate::evidence::ArtifactKind;
use crate::ledger::EntryType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two transacting parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Renter,
    Host,
}

impl Actor {
    pub fn other(self) -> Actor {
        match self {
            Actor::Renter => Actor::Host,
            Actor::Host => Actor::Renter,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Actor::Renter => "renter",
            Actor::Host => "host",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence an actor must have produced before their confirmation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceRequirement {
    /// A single canonical artifact must exist.
    Artifact(ArtifactKind),
    /// At least one damage photo must exist.
    DamagePhotos,
}

/// One of the three gated lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    End,
    Completion,
}

impl Phase {
    /// Statuses from which this phase accepts confirmations.
    pub fn required_statuses(self) -> &'static [BookingStatus] {
        match self {
            Phase::Start => &[BookingStatus::HostApproved, BookingStatus::AdminApproved],
            Phase::End => &[BookingStatus::Started],
            Phase::Completion => &[BookingStatus::Ended],
        }
    }

    /// Status the booking flips to once both actors have confirmed.
    pub fn completed_status(self) -> BookingStatus {
        match self {
            Phase::Start => BookingStatus::Started,
            Phase::End => BookingStatus::Ended,
            Phase::Completion => BookingStatus::Completed,
        }
    }

    /// Ledger entry type marking that this phase has happened exactly once.
    pub fn entry_type(self) -> EntryType {
        match self {
            Phase::Start => EntryType::BookingStarted,
            Phase::End => EntryType::BookingEnded,
            Phase::Completion => EntryType::BookingCompleted,
        }
    }

    /// Scheduled boundary that must have passed before confirmation, if any.
    /// Completion has no temporal guard.
    pub fn boundary(self, booking: &Booking) -> Option<DateTime<Utc>> {
        match self {
            Phase::Start => Some(booking.start_time),
            Phase::End => Some(booking.end_time),
            Phase::Completion => None,
        }
    }

    /// Only the start phase enforces a strict order: the renter's
    /// confirmation is rejected until the host has confirmed.
    pub fn host_confirms_first(self) -> bool {
        matches!(self, Phase::Start)
    }

    /// Evidence the given actor must have produced for this phase.
    ///
    /// `has_damage` only matters for the host's end confirmation: claiming
    /// damage requires at least one damage photo.
    pub fn evidence_for(self, actor: Actor, has_damage: bool) -> Option<EvidenceRequirement> {
        match (self, actor) {
            (Phase::Start, Actor::Host) => {
                Some(EvidenceRequirement::Artifact(ArtifactKind::HostStartVideo))
            }
            (Phase::Start, Actor::Renter) => Some(EvidenceRequirement::Artifact(
                ArtifactKind::RenterStartVideo,
            )),
            (Phase::End, Actor::Host) if has_damage => Some(EvidenceRequirement::DamagePhotos),
            (Phase::End, _) => None,
            (Phase::Completion, Actor::Host) => {
                Some(EvidenceRequirement::Artifact(ArtifactKind::ReturnVideo))
            }
            (Phase::Completion, Actor::Renter) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::End => "end",
            Phase::Completion => "completion",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
