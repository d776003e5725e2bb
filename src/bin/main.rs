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

use chrono::{DateTime, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::warn;
use trip_ledger_rs::{
    ArtifactKind, Booking, BookingEngine, BookingId, BookingStatus, Clock, Credential,
    EngineConfig, EvidenceGate, InMemoryEvidenceStore, ManualClock, NoopNotifier,
    StaticAdminList, UserId,
};

/// Trip Ledger - Replay booking lifecycle event CSV files
///
/// Reads lifecycle events from a CSV file, runs them through the booking
/// engine, and outputs final booking states to stdout.
#[derive(Parser, Debug)]
#[command(name = "trip-ledger-rs")]
#[command(about = "A booking lifecycle engine that replays event CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with lifecycle events
    ///
    /// Expected format: op,at,booking,renter,owner,user,damage,amount,start_time,end_time,artifact
    /// Example: cargo run -- events.csv > bookings.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// User id granted admin privileges (repeatable)
    #[arg(long = "admin", value_name = "UID")]
    admins: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let replay = Replay::new(args.admins.iter().map(|uid| UserId::from(uid.as_str())));
    if let Err(e) = replay.process_events(BufReader::new(file)) {
        eprintln!("Error processing events: {}", e);
        process::exit(1);
    }

    if let Err(e) = replay.write_bookings(std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, at, booking, renter, owner, user, damage, amount,
/// start_time, end_time, artifact`. Unused fields are left empty.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    at: Option<DateTime<Utc>>,
    #[serde(default)]
    booking: String,
    #[serde(default)]
    renter: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    user: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    damage: Option<bool>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    artifact: String,
}

/// One parsed lifecycle event.
#[derive(Debug)]
enum Event {
    Create {
        booking: BookingId,
        renter: UserId,
        owner: UserId,
        amount: Decimal,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
    Upload {
        booking: BookingId,
        artifact: String,
    },
    ConfirmStart {
        booking: BookingId,
        user: UserId,
    },
    ConfirmEnd {
        booking: BookingId,
        user: UserId,
        damage: bool,
    },
    ConfirmCompletion {
        booking: BookingId,
        user: UserId,
    },
    AdminComplete {
        booking: BookingId,
        user: UserId,
    },
    Sweep,
}

impl CsvRecord {
    /// Converts a CSV record to an event.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_event(self) -> Option<Event> {
        let booking = || BookingId::from(self.booking.as_str());
        let user = || UserId::from(self.user.as_str());

        match self.op.to_lowercase().as_str() {
            "create" => Some(Event::Create {
                booking: booking(),
                renter: UserId::from(self.renter.as_str()),
                owner: UserId::from(self.owner.as_str()),
                amount: self.amount?,
                start_time: self.start_time?,
                end_time: self.end_time?,
            }),
            "upload" => Some(Event::Upload {
                booking: booking(),
                artifact: self.artifact,
            }),
            "confirm_start" => Some(Event::ConfirmStart {
                booking: booking(),
                user: user(),
            }),
            "confirm_end" => Some(Event::ConfirmEnd {
                booking: booking(),
                user: user(),
                damage: self.damage.unwrap_or(false),
            }),
            "confirm_completion" => Some(Event::ConfirmCompletion {
                booking: booking(),
                user: user(),
            }),
            "admin_complete" => Some(Event::AdminComplete {
                booking: booking(),
                user: user(),
            }),
            "sweep" => Some(Event::Sweep),
            _ => None,
        }
    }
}

/// Engine plus the injected clock and evidence store the replay drives.
struct Replay {
    engine: BookingEngine,
    evidence: Arc<InMemoryEvidenceStore>,
    clock: Arc<ManualClock>,
}

impl Replay {
    fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        let evidence = Arc::new(InMemoryEvidenceStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = BookingEngine::new(
            EngineConfig::default(),
            Arc::clone(&evidence) as Arc<dyn EvidenceGate>,
            Arc::new(StaticAdminList::new(admins)),
            Arc::new(NoopNotifier),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Replay {
            engine,
            evidence,
            clock,
        }
    }

    /// Process lifecycle events from a CSV reader.
    ///
    /// Streaming: arbitrarily large files are fine. Malformed rows, unknown
    /// ops, and events the engine rejects are logged and skipped; the replay
    /// always runs to the end of the file.
    ///
    /// The optional `at` column sets the engine clock before the event is
    /// applied, which makes replays of temporal guards deterministic.
    fn process_events<R: Read>(&self, reader: R) -> Result<(), csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        for result in rdr.deserialize::<CsvRecord>() {
            match result {
                Ok(record) => {
                    if let Some(at) = record.at {
                        self.clock.set(at);
                    }
                    let Some(event) = record.into_event() else {
                        warn!("skipping invalid event record");
                        continue;
                    };
                    self.apply(event);
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed row");
                    continue;
                }
            }
        }

        Ok(())
    }

    fn apply(&self, event: Event) {
        let outcome = match event {
            Event::Create {
                booking,
                renter,
                owner,
                amount,
                start_time,
                end_time,
            } => {
                let booking = Booking::new(
                    booking,
                    renter,
                    owner,
                    BookingStatus::HostApproved,
                    start_time,
                    end_time,
                    amount,
                );
                if let Err(e) = self.engine.add_booking(booking) {
                    warn!(error = %e, "skipping create");
                }
                return;
            }
            Event::Upload { booking, artifact } => {
                self.upload(&booking, &artifact);
                return;
            }
            Event::ConfirmStart { booking, user } => self
                .engine
                .confirm_start(Some(&Credential { user_id: user }), &booking)
                .map(|_| ()),
            Event::ConfirmEnd {
                booking,
                user,
                damage,
            } => self
                .engine
                .confirm_end(Some(&Credential { user_id: user }), &booking, damage)
                .map(|_| ()),
            Event::ConfirmCompletion { booking, user } => self
                .engine
                .confirm_completion(Some(&Credential { user_id: user }), &booking)
                .map(|_| ()),
            Event::AdminComplete { booking, user } => self
                .engine
                .admin_complete_booking(Some(&Credential { user_id: user }), &booking)
                .map(|_| ()),
            Event::Sweep => {
                self.engine.sweep_ended_bookings();
                return;
            }
        };

        if let Err(e) = outcome {
            warn!(error = %e, "event rejected");
        }
    }

    fn upload(&self, booking: &BookingId, artifact: &str) {
        match artifact {
            "host_start_video" => self.evidence.put(booking, ArtifactKind::HostStartVideo),
            "renter_start_video" => self.evidence.put(booking, ArtifactKind::RenterStartVideo),
            "return_video" => self.evidence.put(booking, ArtifactKind::ReturnVideo),
            "damage_photo" => {
                self.evidence.put_damage_photo(booking);
            }
            other => warn!(artifact = other, "skipping unknown artifact kind"),
        }
    }

    /// Write final booking states to a CSV writer.
    ///
    /// Columns: `booking, status, started_at, ended_at, completed_at, fee,
    /// host_earning`. Rows are sorted by booking id so output is stable.
    fn write_bookings<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record([
            "booking",
            "status",
            "started_at",
            "ended_at",
            "completed_at",
            "fee",
            "host_earning",
        ])?;

        let mut ids = self.engine.store().ids();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        for id in ids {
            let Some(booking) = self.engine.store().snapshot(&id) else {
                continue;
            };
            let stamp = |t: Option<DateTime<Utc>>| {
                t.map(|t| t.to_rfc3339()).unwrap_or_default()
            };
            let (fee, earning) = match booking.settlement {
                Some(s) => (s.fee.to_string(), s.host_earning.to_string()),
                None => (String::new(), String::new()),
            };
            wtr.write_record([
                booking.id.as_str().to_string(),
                booking.status.to_string(),
                stamp(booking.started_at),
                stamp(booking.ended_at),
                stamp(booking.completed_at),
                fee,
                earning,
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}
