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

//! Error taxonomy for the confirmation protocol.
//!
//! Every guard violation is detected before any write and surfaced with a
//! machine-readable sub-code so a UI can branch on it. An idempotent
//! duplicate invocation (the ledger entry already exists) is NOT an error;
//! it returns a successful no-op outcome instead.

use crate::base::BookingId;
use crate::booking::BookingStatus;
use crate::phase::{Actor, Phase};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Concrete step a caller must take before retrying a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredAction {
    UploadHostStartVideo,
    UploadRenterStartVideo,
    UploadDamagePhotos,
    UploadReturnVideo,
}

impl RequiredAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RequiredAction::UploadHostStartVideo => "upload host walkaround video",
            RequiredAction::UploadRenterStartVideo => "upload renter walkaround video",
            RequiredAction::UploadDamagePhotos => "upload damage photos",
            RequiredAction::UploadReturnVideo => "upload return condition video",
        }
    }
}

impl std::fmt::Display for RequiredAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-codes distinguishing the failed-precondition cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionCode {
    /// Booking is not in the required predecessor state.
    InvalidState {
        required: &'static [BookingStatus],
        current: BookingStatus,
    },
    /// The phase's scheduled boundary has not been reached yet.
    TimeNotReached { boundary: DateTime<Utc> },
    /// The renter confirmed before the host in a host-first phase.
    AwaitingHostConfirmation,
    /// Required proof-of-condition media is missing.
    EvidenceRequired { action: RequiredAction },
}

/// Confirmation protocol errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Caller presented no resolved credential.
    #[error("caller must be authenticated")]
    Unauthenticated,

    /// Missing or malformed request field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller is not the party they claim to act as, or lacks admin rights.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Booking does not exist.
    #[error("booking {0} not found")]
    NotFound(BookingId),

    /// A guard rejected the transition. The sub-code says which one.
    #[error("failed precondition: {message}")]
    FailedPrecondition {
        code: PreconditionCode,
        message: String,
    },

    /// The same actor already confirmed this phase. Distinct from the
    /// ledger-level idempotent duplicate, which is a success.
    #[error("{actor} has already confirmed the {phase} phase")]
    AlreadyExists { actor: Actor, phase: Phase },

    /// Unexpected store or adapter failure. Underlying detail is logged,
    /// never carried here.
    #[error("internal error (retryable: {retryable})")]
    Internal { retryable: bool },
}

impl ProtocolError {
    pub fn invalid_state(required: &'static [BookingStatus], current: BookingStatus) -> Self {
        let names: Vec<&str> = required.iter().map(|s| s.as_str()).collect();
        ProtocolError::FailedPrecondition {
            message: format!(
                "booking status must be one of [{}], current status is \"{current}\"",
                names.join(", ")
            ),
            code: PreconditionCode::InvalidState { required, current },
        }
    }

    pub fn time_not_reached(boundary: DateTime<Utc>, what: &str) -> Self {
        ProtocolError::FailedPrecondition {
            message: format!("{what} cannot be confirmed before {}", boundary.to_rfc3339()),
            code: PreconditionCode::TimeNotReached { boundary },
        }
    }

    pub fn awaiting_host(phase: Phase) -> Self {
        ProtocolError::FailedPrecondition {
            message: format!("host must confirm the {phase} phase before the renter"),
            code: PreconditionCode::AwaitingHostConfirmation,
        }
    }

    pub fn evidence_required(actor: Actor, action: RequiredAction) -> Self {
        ProtocolError::FailedPrecondition {
            message: format!("{actor} must {action} before confirming"),
            code: PreconditionCode::EvidenceRequired { action },
        }
    }

    /// True for errors a caller may retry after a short delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::Internal { retryable: true })
    }
}
