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

//! Booking lifecycle engine.
//!
//! Runs the two-actor confirmation protocol for the start, end, and
//! completion phases. Each confirmation executes a fixed guard sequence under
//! the per-booking lock, and the phase-completing write is fenced by the
//! ledger's deterministic key, so a transition is applied exactly once no
//! matter how the calls race or retry.
//!
//! The guard sequence, in order:
//!
//! 1. caller is authenticated
//! 2. caller is a party to the booking (or an admin, for overrides)
//! 3. the phase's ledger entry does not already exist (else: success no-op)
//! 4. booking is in a required predecessor status
//! 5. this actor has not already confirmed this phase
//! 6. the phase's scheduled boundary has passed
//! 7. this actor's required evidence exists
//!
//! Only then is the confirmation recorded. If the other actor had already
//! confirmed, the same call flips the status, stamps the transition time, and
//! writes the ledger entry; the partial confirmation alone never changes
//! status.

use crate::base::{BookingId, Credential, UserId};
use crate::booking::{Booking, BookingStatus};
use crate::error::{ProtocolError, RequiredAction};
use crate::evidence::{ArtifactKind, EvidenceGate};
use crate::ledger::{EntryType, Ledger, LedgerActor, LedgerEntry};
use crate::phase::{Actor, EvidenceRequirement, Phase};
use crate::settlement::{self, DEFAULT_COMMISSION_RATE};
use crate::store::{BookingStore, StoreError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Time source. Injected so tests and replays control the guard clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Decides who may perform administrative overrides.
pub trait AdminPolicy: Send + Sync {
    fn is_admin(&self, user_id: &UserId) -> bool;
}

/// Fixed allow-list of admin user ids.
#[derive(Debug, Default)]
pub struct StaticAdminList {
    admins: HashSet<UserId>,
}

impl StaticAdminList {
    pub fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        StaticAdminList {
            admins: admins.into_iter().collect(),
        }
    }
}

impl AdminPolicy for StaticAdminList {
    fn is_admin(&self, user_id: &UserId) -> bool {
        self.admins.contains(user_id)
    }
}

/// Outbound notification hooks, invoked after the booking lock is released.
///
/// Strictly fire-and-forget: implementations must swallow and log their own
/// failures. A lost notification never fails or retries a transition.
pub trait Notifier: Send + Sync {
    /// One actor's confirmation was recorded without completing the phase.
    fn confirmation_recorded(&self, booking_id: &BookingId, phase: Phase, actor: Actor);

    /// Both actors confirmed; the booking moved to the phase's status.
    fn phase_completed(&self, booking_id: &BookingId, phase: Phase, new_status: BookingStatus);
}

/// Discards all notifications.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn confirmation_recorded(&self, _: &BookingId, _: Phase, _: Actor) {}
    fn phase_completed(&self, _: &BookingId, _: Phase, _: BookingStatus) {}
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Platform commission rate applied when funds are recognized.
    pub commission_rate: Decimal,
    /// How long after a booking ends before the sweep force-completes it.
    pub completion_grace: chrono::Duration,
    /// Per-attempt deadline for taking a booking lock.
    pub lock_timeout: Duration,
    /// Lock acquisition attempts before giving up with a retryable error.
    pub lock_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            commission_rate: DEFAULT_COMMISSION_RATE,
            completion_grace: chrono::Duration::hours(24),
            lock_timeout: Duration::from_millis(500),
            lock_attempts: 3,
        }
    }
}

/// Result of a confirmation call.
///
/// "Other actor still pending" is success, not failure; so is the
/// ledger-fenced duplicate of an already completed phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmOutcome {
    pub booking_id: BookingId,
    pub phase: Phase,
    pub actor: Actor,
    /// True when this call completed the phase and flipped the status.
    pub advanced: bool,
    /// True when both actors have confirmed (by this call or earlier).
    pub both_confirmed: bool,
    /// True when the phase's ledger entry already existed and the call was
    /// an idempotent no-op.
    pub already_confirmed: bool,
    pub new_status: BookingStatus,
    pub message: String,
}

/// Result of an administrative completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteOutcome {
    pub booking_id: BookingId,
    /// False when the booking was already completed (idempotent no-op).
    pub completed: bool,
    pub new_status: BookingStatus,
    pub message: String,
}

/// Existence report for a booking's proof-of-condition media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvidenceStatus {
    pub host_start_video: bool,
    pub renter_start_video: bool,
    pub damage_photo_count: u32,
    pub return_video: bool,
}

/// The lifecycle engine. All mutation of bookings and the ledger goes
/// through here.
pub struct BookingEngine {
    store: BookingStore,
    ledger: Ledger,
    evidence: Arc<dyn EvidenceGate>,
    admin: Arc<dyn AdminPolicy>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl BookingEngine {
    pub fn new(
        config: EngineConfig,
        evidence: Arc<dyn EvidenceGate>,
        admin: Arc<dyn AdminPolicy>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        BookingEngine {
            store: BookingStore::new(),
            ledger: Ledger::new(),
            evidence,
            admin,
            notifier,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &BookingStore {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn notify_sweep_completion(&self, booking_id: &BookingId) {
        self.notifier
            .phase_completed(booking_id, Phase::Completion, BookingStatus::Completed);
    }

    /// Seeds a booking. Intake and approval happen outside this crate.
    pub fn add_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.store.insert(booking)
    }

    /// Renter's or host's start-of-rental confirmation.
    pub fn confirm_start(
        &self,
        credential: Option<&Credential>,
        booking_id: &BookingId,
    ) -> Result<ConfirmOutcome, ProtocolError> {
        self.confirm(credential, booking_id, Phase::Start, false)
    }

    /// Renter's or host's end-of-rental confirmation. The host sets
    /// `reports_damage` to claim damage, which requires photo evidence.
    pub fn confirm_end(
        &self,
        credential: Option<&Credential>,
        booking_id: &BookingId,
        reports_damage: bool,
    ) -> Result<ConfirmOutcome, ProtocolError> {
        self.confirm(credential, booking_id, Phase::End, reports_damage)
    }

    /// Renter's or host's final completion confirmation.
    pub fn confirm_completion(
        &self,
        credential: Option<&Credential>,
        booking_id: &BookingId,
    ) -> Result<ConfirmOutcome, ProtocolError> {
        self.confirm(credential, booking_id, Phase::Completion, false)
    }

    fn confirm(
        &self,
        credential: Option<&Credential>,
        booking_id: &BookingId,
        phase: Phase,
        reports_damage: bool,
    ) -> Result<ConfirmOutcome, ProtocolError> {
        let caller = authenticated(credential)?;
        if booking_id.is_empty() {
            return Err(ProtocolError::InvalidArgument(
                "booking id must not be empty".into(),
            ));
        }

        // Ledger fast path: an existing entry means the phase already
        // happened, so a duplicate invocation is a no-op before the booking
        // lock is even taken.
        if self.ledger.exists(booking_id, phase.entry_type()) {
            let booking = self
                .store
                .snapshot(booking_id)
                .ok_or_else(|| ProtocolError::NotFound(booking_id.clone()))?;
            let actor = party_of(&booking, caller)?;
            return Ok(noop_outcome(&booking, phase, actor));
        }

        let now = self.clock.now();
        let outcome = self.store.with_booking(
            booking_id,
            self.config.lock_timeout,
            self.config.lock_attempts,
            |booking| self.run_guards(booking, caller, phase, reports_damage, now),
        )?;

        // Notifications go out after the lock is released.
        if outcome.advanced {
            info!(
                booking = %outcome.booking_id,
                phase = %phase,
                actor = %outcome.actor,
                status = %outcome.new_status,
                "phase completed"
            );
            self.notifier
                .phase_completed(&outcome.booking_id, phase, outcome.new_status);
        } else if !outcome.already_confirmed {
            info!(
                booking = %outcome.booking_id,
                phase = %phase,
                actor = %outcome.actor,
                "confirmation recorded, awaiting counterparty"
            );
            self.notifier
                .confirmation_recorded(&outcome.booking_id, phase, outcome.actor);
        }

        Ok(outcome)
    }

    /// The guard sequence. Runs under the booking lock; mutates nothing
    /// until every guard has passed.
    fn run_guards(
        &self,
        booking: &mut Booking,
        caller: &UserId,
        phase: Phase,
        reports_damage: bool,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, ProtocolError> {
        let actor = party_of(booking, caller)?;

        // Re-check under the lock: the ledger entry, not the status field,
        // is the source of truth for "this phase already happened".
        if self.ledger.exists(&booking.id, phase.entry_type()) {
            return Ok(noop_outcome(booking, phase, actor));
        }

        if !phase.required_statuses().contains(&booking.status) {
            return Err(ProtocolError::invalid_state(
                phase.required_statuses(),
                booking.status,
            ));
        }

        if booking.confirmations(phase).get(actor).is_confirmed() {
            return Err(ProtocolError::AlreadyExists { actor, phase });
        }

        if phase.host_confirms_first()
            && actor == Actor::Renter
            && !booking.confirmations(phase).host.is_confirmed()
        {
            return Err(ProtocolError::awaiting_host(phase));
        }

        if let Some(boundary) = phase.boundary(booking) {
            if now < boundary {
                return Err(ProtocolError::time_not_reached(boundary, phase.as_str()));
            }
        }

        if let Some(requirement) = phase.evidence_for(actor, reports_damage) {
            self.check_evidence(&booking.id, actor, requirement)?;
        }

        booking.confirmations_mut(phase).record(actor, now);

        let advanced = booking.confirmations(phase).both_confirmed();
        if advanced {
            booking.status = phase.completed_status();
            booking.stamp_phase(phase, now);

            self.ledger.create(LedgerEntry {
                booking_id: booking.id.clone(),
                entry_type: phase.entry_type(),
                actor: LedgerActor::System,
                created_at: now,
                renter_id: booking.renter_id.clone(),
                owner_id: booking.owner_id.clone(),
                settlement: None,
            });

            // Starting the rental recognizes the renter's payment: compute
            // the split and record it, fenced by its own ledger key.
            if phase == Phase::Start {
                let settlement =
                    settlement::settle(booking.amount_paid, self.config.commission_rate);
                let outcome = self.ledger.create(LedgerEntry {
                    booking_id: booking.id.clone(),
                    entry_type: EntryType::FundsReceived,
                    actor: LedgerActor::System,
                    created_at: now,
                    renter_id: booking.renter_id.clone(),
                    owner_id: booking.owner_id.clone(),
                    settlement: Some(settlement),
                });
                if outcome.created() {
                    booking.settlement = Some(settlement);
                }
            }
        }

        let message = if advanced {
            format!("booking is now {}", booking.status)
        } else {
            format!("awaiting {} confirmation", actor.other())
        };
        Ok(ConfirmOutcome {
            booking_id: booking.id.clone(),
            phase,
            actor,
            advanced,
            both_confirmed: advanced,
            already_confirmed: false,
            new_status: booking.status,
            message,
        })
    }

    fn check_evidence(
        &self,
        booking_id: &BookingId,
        actor: Actor,
        requirement: EvidenceRequirement,
    ) -> Result<(), ProtocolError> {
        let (present, action) = match requirement {
            EvidenceRequirement::Artifact(kind) => {
                let present = self
                    .evidence
                    .exists(booking_id, kind)
                    .map_err(|e| self.evidence_unavailable(booking_id, &e))?;
                (present, required_action(kind))
            }
            EvidenceRequirement::DamagePhotos => {
                let count = self
                    .evidence
                    .damage_photo_count(booking_id)
                    .map_err(|e| self.evidence_unavailable(booking_id, &e))?;
                (count > 0, RequiredAction::UploadDamagePhotos)
            }
        };

        if present {
            Ok(())
        } else {
            Err(ProtocolError::evidence_required(actor, action))
        }
    }

    fn evidence_unavailable(
        &self,
        booking_id: &BookingId,
        err: &crate::evidence::EvidenceError,
    ) -> ProtocolError {
        error!(booking = %booking_id, %err, "evidence gate unavailable");
        ProtocolError::Internal { retryable: true }
    }

    /// Administrative override: force-completes an ended booking without the
    /// parties' completion confirmations. Idempotent.
    pub fn admin_complete_booking(
        &self,
        credential: Option<&Credential>,
        booking_id: &BookingId,
    ) -> Result<CompleteOutcome, ProtocolError> {
        let caller = authenticated(credential)?;
        if !self.admin.is_admin(caller) {
            return Err(ProtocolError::PermissionDenied(format!(
                "{caller} lacks admin privileges"
            )));
        }
        self.complete_ended(booking_id, LedgerActor::Admin(caller.clone()))
    }

    /// Shared completion path for admin overrides and the scheduled sweep.
    pub(crate) fn complete_ended(
        &self,
        booking_id: &BookingId,
        by: LedgerActor,
    ) -> Result<CompleteOutcome, ProtocolError> {
        let now = self.clock.now();
        let outcome = self.store.with_booking(
            booking_id,
            self.config.lock_timeout,
            self.config.lock_attempts,
            |booking| {
                if self
                    .ledger
                    .exists(&booking.id, EntryType::BookingCompleted)
                {
                    return Ok(CompleteOutcome {
                        booking_id: booking.id.clone(),
                        completed: false,
                        new_status: booking.status,
                        message: "booking already completed".into(),
                    });
                }

                if booking.status != BookingStatus::Ended {
                    return Err(ProtocolError::invalid_state(
                        Phase::Completion.required_statuses(),
                        booking.status,
                    ));
                }

                booking.status = BookingStatus::Completed;
                booking.stamp_phase(Phase::Completion, now);
                self.ledger.create(LedgerEntry {
                    booking_id: booking.id.clone(),
                    entry_type: EntryType::BookingCompleted,
                    actor: by.clone(),
                    created_at: now,
                    renter_id: booking.renter_id.clone(),
                    owner_id: booking.owner_id.clone(),
                    settlement: None,
                });

                Ok(CompleteOutcome {
                    booking_id: booking.id.clone(),
                    completed: true,
                    new_status: booking.status,
                    message: "booking completed by administrative override".into(),
                })
            },
        )?;

        if outcome.completed {
            info!(booking = %outcome.booking_id, actor = %by, "booking force-completed");
            self.notifier.phase_completed(
                &outcome.booking_id,
                Phase::Completion,
                BookingStatus::Completed,
            );
        }
        Ok(outcome)
    }

    /// Reports which proof-of-condition artifacts exist for a booking.
    /// Visible to the booking's parties and to admins.
    pub fn evidence_status(
        &self,
        credential: Option<&Credential>,
        booking_id: &BookingId,
    ) -> Result<EvidenceStatus, ProtocolError> {
        let caller = authenticated(credential)?;
        let booking = self
            .store
            .snapshot(booking_id)
            .ok_or_else(|| ProtocolError::NotFound(booking_id.clone()))?;

        if booking.role_of(caller).is_none() && !self.admin.is_admin(caller) {
            return Err(ProtocolError::PermissionDenied(format!(
                "{caller} may not view evidence for booking {booking_id}"
            )));
        }

        let exists = |kind| {
            self.evidence
                .exists(booking_id, kind)
                .map_err(|e| self.evidence_unavailable(booking_id, &e))
        };
        Ok(EvidenceStatus {
            host_start_video: exists(ArtifactKind::HostStartVideo)?,
            renter_start_video: exists(ArtifactKind::RenterStartVideo)?,
            damage_photo_count: self
                .evidence
                .damage_photo_count(booking_id)
                .map_err(|e| self.evidence_unavailable(booking_id, &e))?,
            return_video: exists(ArtifactKind::ReturnVideo)?,
        })
    }
}

fn authenticated(credential: Option<&Credential>) -> Result<&UserId, ProtocolError> {
    credential
        .map(|c| &c.user_id)
        .ok_or(ProtocolError::Unauthenticated)
}

fn party_of(booking: &Booking, caller: &UserId) -> Result<Actor, ProtocolError> {
    booking.role_of(caller).ok_or_else(|| {
        ProtocolError::PermissionDenied(format!(
            "{caller} is not a party to booking {}",
            booking.id
        ))
    })
}

fn noop_outcome(booking: &Booking, phase: Phase, actor: Actor) -> ConfirmOutcome {
    ConfirmOutcome {
        booking_id: booking.id.clone(),
        phase,
        actor,
        advanced: false,
        both_confirmed: true,
        already_confirmed: true,
        new_status: booking.status,
        message: format!("{phase} phase already completed"),
    }
}

fn required_action(kind: ArtifactKind) -> RequiredAction {
    match kind {
        ArtifactKind::HostStartVideo => RequiredAction::UploadHostStartVideo,
        ArtifactKind::RenterStartVideo => RequiredAction::UploadRenterStartVideo,
        ArtifactKind::DamagePhoto(_) => RequiredAction::UploadDamagePhotos,
        ArtifactKind::ReturnVideo => RequiredAction::UploadReturnVideo,
    }
}
