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

//! Benchmarks for the booking lifecycle engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Full lifecycle throughput
//! - Idempotent replay of an already-completed phase
//! - Parallel lifecycles across many bookings
//! - Sweep pass scaling with store size

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use trip_ledger_rs::{
    ArtifactKind, Booking, BookingEngine, BookingId, BookingStatus, Clock, Credential,
    EngineConfig, EvidenceGate, InMemoryEvidenceStore, ManualClock, NoopNotifier,
    StaticAdminList, UserId,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

fn build_engine() -> (Arc<BookingEngine>, Arc<InMemoryEvidenceStore>, Arc<ManualClock>) {
    let evidence = Arc::new(InMemoryEvidenceStore::new());
    let clock = Arc::new(ManualClock::new(start_time() + Duration::days(3)));
    let engine = Arc::new(BookingEngine::new(
        EngineConfig::default(),
        Arc::clone(&evidence) as Arc<dyn EvidenceGate>,
        Arc::new(StaticAdminList::default()),
        Arc::new(NoopNotifier),
        Arc::clone(&clock) as Arc<dyn Clock>,
    ));
    (engine, evidence, clock)
}

fn seed(engine: &BookingEngine, evidence: &InMemoryEvidenceStore, id: &str) -> BookingId {
    let booking_id = BookingId::from(id);
    engine
        .add_booking(Booking::new(
            booking_id.clone(),
            UserId::from("r1"),
            UserId::from("o1"),
            BookingStatus::HostApproved,
            start_time(),
            start_time() + Duration::days(2),
            dec!(100.00),
        ))
        .unwrap();
    evidence.put(&booking_id, ArtifactKind::HostStartVideo);
    evidence.put(&booking_id, ArtifactKind::RenterStartVideo);
    evidence.put(&booking_id, ArtifactKind::ReturnVideo);
    booking_id
}

fn host() -> Credential {
    Credential {
        user_id: UserId::from("o1"),
    }
}

fn renter() -> Credential {
    Credential {
        user_id: UserId::from("r1"),
    }
}

fn run_lifecycle(engine: &BookingEngine, id: &BookingId) {
    engine.confirm_start(Some(&host()), id).unwrap();
    engine.confirm_start(Some(&renter()), id).unwrap();
    engine.confirm_end(Some(&renter()), id, false).unwrap();
    engine.confirm_end(Some(&host()), id, false).unwrap();
    engine.confirm_completion(Some(&host()), id).unwrap();
    engine.confirm_completion(Some(&renter()), id).unwrap();
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_full_lifecycle(c: &mut Criterion) {
    c.bench_function("full_lifecycle", |b| {
        b.iter(|| {
            let (engine, evidence, _) = build_engine();
            let id = seed(&engine, &evidence, "b1");
            run_lifecycle(&engine, black_box(&id));
        })
    });
}

fn bench_idempotent_replay(c: &mut Criterion) {
    // Replays of a completed phase hit the ledger fast path.
    let (engine, evidence, _) = build_engine();
    let id = seed(&engine, &evidence, "b1");
    run_lifecycle(&engine, &id);

    c.bench_function("idempotent_replay", |b| {
        b.iter(|| {
            engine
                .confirm_completion(Some(&renter()), black_box(&id))
                .unwrap();
        })
    });
}

fn bench_parallel_lifecycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_lifecycles");
    for bookings in [100usize, 1_000] {
        group.throughput(Throughput::Elements(bookings as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(bookings),
            &bookings,
            |b, &bookings| {
                b.iter(|| {
                    let (engine, evidence, _) = build_engine();
                    let ids: Vec<BookingId> = (0..bookings)
                        .map(|i| seed(&engine, &evidence, &format!("b{i}")))
                        .collect();
                    ids.par_iter().for_each(|id| run_lifecycle(&engine, id));
                })
            },
        );
    }
    group.finish();
}

fn bench_sweep_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_pass");
    for bookings in [100usize, 1_000] {
        group.throughput(Throughput::Elements(bookings as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(bookings),
            &bookings,
            |b, &bookings| {
                // Completed bookings stay in the store; the sweep still has
                // to visit and dismiss them.
                let (engine, evidence, clock) = build_engine();
                for i in 0..bookings {
                    let id = seed(&engine, &evidence, &format!("b{i}"));
                    run_lifecycle(&engine, &id);
                }
                clock.advance(Duration::days(30));
                b.iter(|| black_box(engine.sweep_ended_bookings()))
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_full_lifecycle,
    bench_idempotent_replay,
    bench_parallel_lifecycles,
    bench_sweep_pass,
);
criterion_main!(benches);
