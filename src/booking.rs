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

//! Booking entity and lifecycle status.
//!
//! Status moves forward only:
//!
//! ```text
//! requested ──► {pending_admin_approval | host_approved} ──► admin_approved
//!                                   │
//!                                   ▼
//!                     started ──► ended ──► completed
//! ```
//!
//! `cancelled` is reachable from any pre-`started` state. `completed` and
//! `cancelled` are terminal.

use crate::base::{BookingId, UserId};
use crate::phase::{Actor, Phase};
use crate::settlement::Settlement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a booking. A single authoritative field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    PendingAdminApproval,
    HostApproved,
    AdminApproved,
    Started,
    Ended,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Position along the forward transition graph. Used to assert that
    /// status never moves backward.
    pub fn rank(self) -> u8 {
        match self {
            BookingStatus::Requested => 0,
            BookingStatus::PendingAdminApproval => 1,
            BookingStatus::HostApproved => 1,
            BookingStatus::AdminApproved => 2,
            BookingStatus::Started => 3,
            BookingStatus::Ended => 4,
            BookingStatus::Completed => 5,
            // Cancellation is the one sideways exit; rank it terminal.
            BookingStatus::Cancelled => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::PendingAdminApproval => "pending_admin_approval",
            BookingStatus::HostApproved => "host_approved",
            BookingStatus::AdminApproved => "admin_approved",
            BookingStatus::Started => "started",
            BookingStatus::Ended => "ended",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One actor's confirmation for one phase.
///
/// Modeled as an explicit variant rather than an optional boolean so the
/// duplicate-confirmation guard is a structural check. Once `Confirmed`,
/// never unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Confirmation {
    Pending,
    Confirmed { at: DateTime<Utc> },
}

impl Confirmation {
    pub fn is_confirmed(self) -> bool {
        matches!(self, Confirmation::Confirmed { .. })
    }
}

/// Both actors' confirmations for a single phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfirmations {
    pub host: Confirmation,
    pub renter: Confirmation,
}

impl PhaseConfirmations {
    pub fn none() -> Self {
        PhaseConfirmations {
            host: Confirmation::Pending,
            renter: Confirmation::Pending,
        }
    }

    pub fn get(&self, actor: Actor) -> Confirmation {
        match actor {
            Actor::Host => self.host,
            Actor::Renter => self.renter,
        }
    }

    /// Records a confirmation. Write-once: recording over an existing
    /// confirmation is a caller bug and is ignored.
    pub fn record(&mut self, actor: Actor, at: DateTime<Utc>) {
        let slot = match actor {
            Actor::Host => &mut self.host,
            Actor::Renter => &mut self.renter,
        };
        if !slot.is_confirmed() {
            *slot = Confirmation::Confirmed { at };
        }
    }

    pub fn both_confirmed(&self) -> bool {
        self.host.is_confirmed() && self.renter.is_confirmed()
    }
}

impl Default for PhaseConfirmations {
    fn default() -> Self {
        Self::none()
    }
}

/// The central entity: a peer-to-peer rental transaction between a renter
/// and an owner.
///
/// Parties and the scheduled window are immutable once set. The engine is
/// the only writer of `status`, the confirmation maps, and the write-once
/// phase timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub renter_id: UserId,
    pub owner_id: UserId,
    pub status: BookingStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Gross amount the renter paid, set at creation.
    pub amount_paid: rust_decimal::Decimal,
    pub start_confirmations: PhaseConfirmations,
    pub end_confirmations: PhaseConfirmations,
    pub completion_confirmations: PhaseConfirmations,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Commission split, populated exactly once when funds are received.
    pub settlement: Option<Settlement>,
}

impl Booking {
    /// Creates a booking in the given initial status. Request intake and
    /// approval live outside this crate; tests and the replay CLI seed
    /// bookings directly in an approved state.
    pub fn new(
        id: BookingId,
        renter_id: UserId,
        owner_id: UserId,
        status: BookingStatus,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        amount_paid: rust_decimal::Decimal,
    ) -> Self {
        Booking {
            id,
            renter_id,
            owner_id,
            status,
            start_time,
            end_time,
            amount_paid,
            start_confirmations: PhaseConfirmations::none(),
            end_confirmations: PhaseConfirmations::none(),
            completion_confirmations: PhaseConfirmations::none(),
            started_at: None,
            ended_at: None,
            completed_at: None,
            settlement: None,
        }
    }

    pub fn confirmations(&self, phase: Phase) -> &PhaseConfirmations {
        match phase {
            Phase::Start => &self.start_confirmations,
            Phase::End => &self.end_confirmations,
            Phase::Completion => &self.completion_confirmations,
        }
    }

    pub fn confirmations_mut(&mut self, phase: Phase) -> &mut PhaseConfirmations {
        match phase {
            Phase::Start => &mut self.start_confirmations,
            Phase::End => &mut self.end_confirmations,
            Phase::Completion => &mut self.completion_confirmations,
        }
    }

    /// Stamps the phase-transition timestamp. Write-once.
    pub fn stamp_phase(&mut self, phase: Phase, at: DateTime<Utc>) {
        let slot = match phase {
            Phase::Start => &mut self.started_at,
            Phase::End => &mut self.ended_at,
            Phase::Completion => &mut self.completed_at,
        };
        if slot.is_none() {
            *slot = Some(at);
        }
    }

    /// Resolves which party a user id is, if either.
    pub fn role_of(&self, user_id: &UserId) -> Option<Actor> {
        if &self.owner_id == user_id {
            Some(Actor::Host)
        } else if &self.renter_id == user_id {
            Some(Actor::Renter)
        } else {
            None
        }
    }
}
