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

//! End-to-end tests for the booking lifecycle engine.
//!
//! These drive whole lifecycles through the public API and check the
//! resulting booking state and ledger contents.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use trip_ledger_rs::{
    Actor, ArtifactKind, Booking, BookingEngine, BookingId, BookingStatus, Clock, Credential,
    EngineConfig, EntryType, EvidenceGate, InMemoryEvidenceStore, LedgerActor, ManualClock,
    NoopNotifier, PreconditionCode, ProtocolError, RequiredAction, StaticAdminList, UserId,
};

const RENTER: &str = "renter-uid";
const HOST: &str = "host-uid";
const ADMIN: &str = "admin-uid";

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

fn end_time() -> DateTime<Utc> {
    start_time() + Duration::days(2)
}

struct Harness {
    engine: BookingEngine,
    evidence: Arc<InMemoryEvidenceStore>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        let evidence = Arc::new(InMemoryEvidenceStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let engine = BookingEngine::new(
            EngineConfig::default(),
            Arc::clone(&evidence) as Arc<dyn EvidenceGate>,
            Arc::new(StaticAdminList::new([UserId::from(ADMIN)])),
            Arc::new(NoopNotifier),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Harness {
            engine,
            evidence,
            clock,
        }
    }

    fn seed(&self, id: &str, status: BookingStatus) -> BookingId {
        let booking_id = BookingId::from(id);
        self.engine
            .add_booking(Booking::new(
                booking_id.clone(),
                UserId::from(RENTER),
                UserId::from(HOST),
                status,
                start_time(),
                end_time(),
                dec!(250.00),
            ))
            .unwrap();
        booking_id
    }

    fn renter(&self) -> Credential {
        Credential {
            user_id: UserId::from(RENTER),
        }
    }

    fn host(&self) -> Credential {
        Credential {
            user_id: UserId::from(HOST),
        }
    }

    fn start_videos(&self, id: &BookingId) {
        self.evidence.put(id, ArtifactKind::HostStartVideo);
        self.evidence.put(id, ArtifactKind::RenterStartVideo);
    }

    /// Drives a seeded booking all the way to `started`.
    fn run_start(&self, id: &BookingId) {
        self.start_videos(id);
        self.engine.confirm_start(Some(&self.host()), id).unwrap();
        self.engine.confirm_start(Some(&self.renter()), id).unwrap();
    }

    /// Drives a started booking to `ended` without a damage claim.
    fn run_end(&self, id: &BookingId) {
        self.clock.set(end_time());
        self.engine
            .confirm_end(Some(&self.renter()), id, false)
            .unwrap();
        self.engine
            .confirm_end(Some(&self.host()), id, false)
            .unwrap();
    }
}

#[test]
fn full_lifecycle_reaches_completed_with_full_ledger() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);

    h.run_start(&id);
    h.run_end(&id);

    h.evidence.put(&id, ArtifactKind::ReturnVideo);
    h.engine.confirm_completion(Some(&h.host()), &id).unwrap();
    let last = h
        .engine
        .confirm_completion(Some(&h.renter()), &id)
        .unwrap();
    assert!(last.advanced);

    let booking = h.engine.store().snapshot(&id).unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);
    assert_eq!(booking.started_at, Some(start_time()));
    assert_eq!(booking.ended_at, Some(end_time()));
    assert!(booking.completed_at.is_some());

    let types: Vec<EntryType> = h
        .engine
        .ledger()
        .for_booking(&id)
        .iter()
        .map(|e| e.entry_type)
        .collect();
    assert_eq!(
        types,
        vec![
            EntryType::BookingStarted,
            EntryType::FundsReceived,
            EntryType::BookingEnded,
            EntryType::BookingCompleted,
        ]
    );
}

#[test]
fn partial_confirmation_never_changes_status() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::AdminApproved);
    h.start_videos(&id);

    let outcome = h.engine.confirm_start(Some(&h.host()), &id).unwrap();
    assert!(!outcome.advanced);
    assert!(!outcome.both_confirmed);
    assert!(!outcome.already_confirmed);

    let booking = h.engine.store().snapshot(&id).unwrap();
    assert_eq!(booking.status, BookingStatus::AdminApproved);
    assert!(booking.start_confirmations.host.is_confirmed());
    assert!(!booking.start_confirmations.renter.is_confirmed());
    assert!(booking.started_at.is_none());
    assert!(h.engine.ledger().is_empty());
}

#[test]
fn phase_entries_carry_system_actor_and_canonical_ids() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);
    h.run_start(&id);

    let entry = h
        .engine
        .ledger()
        .get(&id, EntryType::BookingStarted)
        .unwrap();
    // Two-party completions are finalized by the engine itself.
    assert_eq!(entry.actor, LedgerActor::System);
    assert_eq!(entry.id(), "b1_booking_started");
    assert_eq!(entry.renter_id, UserId::from(RENTER));
    assert_eq!(entry.owner_id, UserId::from(HOST));

    let funds = h.engine.ledger().get(&id, EntryType::FundsReceived).unwrap();
    assert_eq!(funds.actor, LedgerActor::System);
    let settlement = funds.settlement.unwrap();
    assert_eq!(settlement.gross, dec!(250.00));
    assert_eq!(settlement.fee, dec!(25.00));
    assert_eq!(settlement.host_earning, dec!(225.00));
}

#[test]
fn phases_reject_wrong_predecessor_status() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);

    // Cannot end a booking that never started.
    let err = h
        .engine
        .confirm_end(Some(&h.renter()), &id, false)
        .unwrap_err();
    match err {
        ProtocolError::FailedPrecondition {
            code: PreconditionCode::InvalidState { current, .. },
            ..
        } => assert_eq!(current, BookingStatus::HostApproved),
        other => panic!("unexpected error: {other:?}"),
    }

    // Cannot complete it either.
    assert!(matches!(
        h.engine
            .confirm_completion(Some(&h.renter()), &id)
            .unwrap_err(),
        ProtocolError::FailedPrecondition {
            code: PreconditionCode::InvalidState { .. },
            ..
        }
    ));
}

#[test]
fn cancelled_booking_rejects_everything() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::Cancelled);
    h.start_videos(&id);

    assert!(matches!(
        h.engine.confirm_start(Some(&h.host()), &id).unwrap_err(),
        ProtocolError::FailedPrecondition {
            code: PreconditionCode::InvalidState { .. },
            ..
        }
    ));
}

#[test]
fn completion_accepts_either_order_and_has_no_time_guard() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);
    h.run_start(&id);
    h.run_end(&id);

    // Renter first is fine for completion, and no boundary applies.
    h.engine.confirm_completion(Some(&h.renter()), &id).unwrap();

    // Host still needs the return video.
    let err = h
        .engine
        .confirm_completion(Some(&h.host()), &id)
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::evidence_required(Actor::Host, RequiredAction::UploadReturnVideo)
    );

    h.evidence.put(&id, ArtifactKind::ReturnVideo);
    let outcome = h.engine.confirm_completion(Some(&h.host()), &id).unwrap();
    assert!(outcome.advanced);
    assert_eq!(outcome.new_status, BookingStatus::Completed);
}

#[test]
fn end_with_damage_claim_gates_on_photos() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);
    h.run_start(&id);
    h.clock.set(end_time());

    let err = h
        .engine
        .confirm_end(Some(&h.host()), &id, true)
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::evidence_required(Actor::Host, RequiredAction::UploadDamagePhotos)
    );

    h.evidence.put_damage_photo(&id);
    h.engine.confirm_end(Some(&h.host()), &id, true).unwrap();
    // The renter's end confirmation needs no evidence.
    let outcome = h
        .engine
        .confirm_end(Some(&h.renter()), &id, false)
        .unwrap();
    assert!(outcome.advanced);
}

#[test]
fn duplicate_invocations_after_transition_are_noop_successes() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);
    h.run_start(&id);

    // Both actors retry after the flip; neither errors, nothing changes.
    for cred in [h.host(), h.renter()] {
        let outcome = h.engine.confirm_start(Some(&cred), &id).unwrap();
        assert!(outcome.already_confirmed);
        assert!(outcome.both_confirmed);
        assert!(!outcome.advanced);
        assert_eq!(outcome.new_status, BookingStatus::Started);
    }
    assert_eq!(h.engine.ledger().for_booking(&id).len(), 2);
    assert_eq!(
        h.engine.store().snapshot(&id).unwrap().settlement.unwrap().fee,
        dec!(25.00)
    );
}

#[test]
fn repeat_confirmation_before_transition_is_an_error() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);
    h.start_videos(&id);

    h.engine.confirm_start(Some(&h.host()), &id).unwrap();
    let err = h.engine.confirm_start(Some(&h.host()), &id).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::AlreadyExists {
            actor: Actor::Host,
            phase: trip_ledger_rs::Phase::Start,
        }
    );
}

#[test]
fn unknown_booking_is_not_found() {
    let h = Harness::new();
    let id = BookingId::from("missing");
    assert_eq!(
        h.engine.confirm_start(Some(&h.host()), &id).unwrap_err(),
        ProtocolError::NotFound(id)
    );
}

#[test]
fn empty_booking_id_is_invalid_argument() {
    let h = Harness::new();
    assert!(matches!(
        h.engine
            .confirm_start(Some(&h.host()), &BookingId::from(""))
            .unwrap_err(),
        ProtocolError::InvalidArgument(_)
    ));
}

#[test]
fn admin_override_completes_without_party_confirmations() {
    let h = Harness::new();
    let id = h.seed("b1", BookingStatus::HostApproved);
    h.run_start(&id);
    h.run_end(&id);

    let admin = Credential {
        user_id: UserId::from(ADMIN),
    };
    let outcome = h.engine.admin_complete_booking(Some(&admin), &id).unwrap();
    assert!(outcome.completed);

    let booking = h.engine.store().snapshot(&id).unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);
    // Neither party ever confirmed completion.
    assert!(!booking.completion_confirmations.host.is_confirmed());
    assert!(!booking.completion_confirmations.renter.is_confirmed());

    let entry = h
        .engine
        .ledger()
        .get(&id, EntryType::BookingCompleted)
        .unwrap();
    assert_eq!(entry.actor, LedgerActor::Admin(UserId::from(ADMIN)));

    // A late party completion confirmation is now a no-op, not an error.
    let replay = h.engine.confirm_completion(Some(&h.renter()), &id).unwrap();
    assert!(replay.already_confirmed);
    assert!(!replay.advanced);
}

#[test]
fn settlement_is_computed_once_with_configured_rate() {
    let evidence = Arc::new(InMemoryEvidenceStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let config = EngineConfig {
        commission_rate: dec!(0.15),
        ..EngineConfig::default()
    };
    let engine = BookingEngine::new(
        config,
        Arc::clone(&evidence) as Arc<dyn EvidenceGate>,
        Arc::new(StaticAdminList::default()),
        Arc::new(NoopNotifier),
        clock as Arc<dyn Clock>,
    );

    let id = BookingId::from("b1");
    engine
        .add_booking(Booking::new(
            id.clone(),
            UserId::from(RENTER),
            UserId::from(HOST),
            BookingStatus::AdminApproved,
            start_time(),
            end_time(),
            dec!(99.99),
        ))
        .unwrap();
    evidence.put(&id, ArtifactKind::HostStartVideo);
    evidence.put(&id, ArtifactKind::RenterStartVideo);

    let host = Credential {
        user_id: UserId::from(HOST),
    };
    let renter = Credential {
        user_id: UserId::from(RENTER),
    };
    engine.confirm_start(Some(&host), &id).unwrap();
    engine.confirm_start(Some(&renter), &id).unwrap();

    let settlement = engine.store().snapshot(&id).unwrap().settlement.unwrap();
    // 99.99 * 0.15 = 14.9985 -> 15.00; host gets the remainder.
    assert_eq!(settlement.fee, dec!(15.00));
    assert_eq!(settlement.host_earning, dec!(84.99));
    assert_eq!(settlement.fee + settlement.host_earning, dec!(99.99));
}

#[test]
fn host_revenue_totals_across_bookings() {
    let h = Harness::new();
    for id in ["b1", "b2"] {
        let id = h.seed(id, BookingStatus::HostApproved);
        h.clock.set(start_time());
        h.run_start(&id);
    }

    let revenue = trip_ledger_rs::host_revenue(h.engine.ledger(), &UserId::from(HOST));
    assert_eq!(revenue.bookings, 2);
    assert_eq!(revenue.gross, dec!(500.00));
    assert_eq!(revenue.fees, dec!(50.00));
    assert_eq!(revenue.earnings, dec!(450.00));

    let nobody = trip_ledger_rs::host_revenue(h.engine.ledger(), &UserId::from("other"));
    assert_eq!(nobody.bookings, 0);
}
