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

//! Revenue reporting over the ledger.
//!
//! Pure read path: aggregates `funds_received` entries per host. Because the
//! ledger is append-only and deduplicated by key, the totals are stable under
//! retries and need no reconciliation step.

use crate::base::UserId;
use crate::ledger::{EntryType, Ledger};
use rust_decimal::Decimal;
use serde::Serialize;

/// Aggregated earnings for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRevenue {
    pub owner_id: UserId,
    /// Number of bookings whose funds were recognized.
    pub bookings: usize,
    /// Sum of gross amounts across those bookings.
    pub gross: Decimal,
    /// Sum of platform fees withheld.
    pub fees: Decimal,
    /// Sum of the host's earnings.
    pub earnings: Decimal,
}

/// Totals the given host's recognized funds across the whole ledger.
pub fn host_revenue(ledger: &Ledger, owner_id: &UserId) -> HostRevenue {
    let mut revenue = HostRevenue {
        owner_id: owner_id.clone(),
        bookings: 0,
        gross: Decimal::ZERO,
        fees: Decimal::ZERO,
        earnings: Decimal::ZERO,
    };

    for entry in ledger.iter_ordered() {
        if entry.entry_type != EntryType::FundsReceived || &entry.owner_id != owner_id {
            continue;
        }
        // Funds entries always carry a settlement; tolerate its absence
        // rather than panicking on a malformed row.
        let Some(settlement) = entry.settlement else {
            continue;
        };
        revenue.bookings += 1;
        revenue.gross += settlement.gross;
        revenue.fees += settlement.fee;
        revenue.earnings += settlement.host_earning;
    }

    revenue
}
