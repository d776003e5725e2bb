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

//! Trip Ledger: a concurrent lifecycle engine for peer-to-peer rental
//! bookings.
//!
//! A booking moves `started → ended → completed` through a two-actor
//! confirmation protocol: host and renter must each confirm a phase, and
//! only the second confirmation flips the status. Every transition is
//! recorded exactly once in an append-only ledger keyed by
//! `{booking_id}_{entry_type}`, which makes every operation safe to retry.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::{Duration, TimeZone, Utc};
//! use rust_decimal_macros::dec;
//! use trip_ledger_rs::{
//!     ArtifactKind, Booking, BookingEngine, BookingId, BookingStatus, Clock,
//!     Credential, EngineConfig, EvidenceGate, InMemoryEvidenceStore,
//!     ManualClock, NoopNotifier, StaticAdminList, UserId,
//! };
//!
//! let start = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
//! let evidence = Arc::new(InMemoryEvidenceStore::new());
//! let clock = Arc::new(ManualClock::new(start));
//! let engine = BookingEngine::new(
//!     EngineConfig::default(),
//!     Arc::clone(&evidence) as Arc<dyn EvidenceGate>,
//!     Arc::new(StaticAdminList::default()),
//!     Arc::new(NoopNotifier),
//!     Arc::clone(&clock) as Arc<dyn Clock>,
//! );
//!
//! let id = BookingId::from("bk_1");
//! engine
//!     .add_booking(Booking::new(
//!         id.clone(),
//!         UserId::from("renter"),
//!         UserId::from("host"),
//!         BookingStatus::HostApproved,
//!         start,
//!         start + Duration::days(2),
//!         dec!(120.00),
//!     ))
//!     .unwrap();
//!
//! evidence.put(&id, ArtifactKind::HostStartVideo);
//! evidence.put(&id, ArtifactKind::RenterStartVideo);
//!
//! let host = Credential { user_id: UserId::from("host") };
//! let renter = Credential { user_id: UserId::from("renter") };
//! engine.confirm_start(Some(&host), &id).unwrap();
//! let outcome = engine.confirm_start(Some(&renter), &id).unwrap();
//! assert!(outcome.advanced);
//! assert_eq!(outcome.new_status, BookingStatus::Started);
//! ```

pub mod base;
pub mod booking;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod ledger;
pub mod phase;
pub mod revenue;
pub mod settlement;
pub mod store;
pub mod sweep;

pub use base::{BookingId, Credential, UserId};
pub use booking::{Booking, BookingStatus, Confirmation, PhaseConfirmations};
pub use engine::{
    AdminPolicy, BookingEngine, Clock, CompleteOutcome, ConfirmOutcome, EngineConfig,
    EvidenceStatus, ManualClock, NoopNotifier, Notifier, StaticAdminList, SystemClock,
};
pub use error::{PreconditionCode, ProtocolError, RequiredAction};
pub use evidence::{
    ArtifactKind, EvidenceError, EvidenceGate, InMemoryEvidenceStore, damage_photo_prefix,
    object_path,
};
pub use ledger::{CreateOutcome, EntryType, Ledger, LedgerActor, LedgerEntry, LedgerKey};
pub use phase::{Actor, EvidenceRequirement, Phase};
pub use revenue::{HostRevenue, host_revenue};
pub use settlement::{DEFAULT_COMMISSION_RATE, Settlement, settle};
pub use store::{BookingStore, StoreError};
pub use sweep::SweepSummary;
