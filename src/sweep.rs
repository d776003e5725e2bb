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

//! Scheduled sweep: force-completes stale ended bookings.
//!
//! Parties sometimes never send their completion confirmations. The sweep
//! visits every booking, and any still `ended` past the configured grace
//! period is completed as the system actor, fenced by the same ledger key
//! the admin override and party confirmations use.
//!
//! Eligibility is judged under the booking's own lock, so the sweep never
//! races a confirmation into a double transition. One booking failing, for
//! example because its lock could not be taken in time, never aborts the
//! sweep; failures are collected and reported in the summary, and the next
//! pass picks those bookings up again.

use crate::base::BookingId;
use crate::booking::BookingStatus;
use crate::engine::BookingEngine;
use crate::error::ProtocolError;
use crate::ledger::{EntryType, LedgerActor, LedgerEntry};
use crate::phase::Phase;
use tracing::{info, warn};

/// Outcome of one sweep run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepSummary {
    /// Stale bookings acted on: completions plus failures. Bookings visited
    /// and found ineligible are not counted.
    pub processed: usize,
    /// Bookings this run completed.
    pub completed: usize,
    /// Bookings that failed, with the error each one hit.
    pub failed: Vec<(BookingId, ProtocolError)>,
}

enum Disposition {
    NotEligible,
    Completed,
}

impl BookingEngine {
    /// Runs one sweep pass over all bookings.
    pub fn sweep_ended_bookings(&self) -> SweepSummary {
        let now = self.clock_now();
        let grace = self.config().completion_grace;
        let timeout = self.config().lock_timeout;
        let attempts = self.config().lock_attempts;

        let mut summary = SweepSummary::default();
        let mut completed_ids = Vec::new();
        for id in self.store().ids() {
            let swept = self.store().with_booking(&id, timeout, attempts, |booking| {
                if booking.status != BookingStatus::Ended
                    || self
                        .ledger()
                        .exists(&booking.id, EntryType::BookingCompleted)
                {
                    return Ok(Disposition::NotEligible);
                }
                // Grace runs from the actual end of the rental when known,
                // otherwise from the scheduled end.
                let reference = booking.ended_at.unwrap_or(booking.end_time);
                if now < reference + grace {
                    return Ok(Disposition::NotEligible);
                }

                booking.status = BookingStatus::Completed;
                booking.stamp_phase(Phase::Completion, now);
                self.ledger().create(LedgerEntry {
                    booking_id: booking.id.clone(),
                    entry_type: EntryType::BookingCompleted,
                    actor: LedgerActor::System,
                    created_at: now,
                    renter_id: booking.renter_id.clone(),
                    owner_id: booking.owner_id.clone(),
                    settlement: None,
                });
                Ok(Disposition::Completed)
            });

            match swept {
                Ok(Disposition::NotEligible) => {}
                Ok(Disposition::Completed) => {
                    summary.processed += 1;
                    summary.completed += 1;
                    completed_ids.push(id);
                }
                Err(err) => {
                    // A booking we could not inspect may well be stale;
                    // count it so operators see it, and retry next pass.
                    warn!(booking = %id, %err, "sweep failed to inspect booking");
                    summary.processed += 1;
                    summary.failed.push((id, err));
                }
            }
        }

        for id in &completed_ids {
            info!(booking = %id, "stale booking force-completed by sweep");
            self.notify_sweep_completion(id);
        }

        info!(
            processed = summary.processed,
            completed = summary.completed,
            failed = summary.failed.len(),
            "sweep pass finished"
        );
        summary
    }
}
