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

//! Settlement calculator.
//!
//! Pure function computing the commission/host-earning split from a gross
//! amount. Invoked exactly once per booking, gated by the `funds_received`
//! ledger key. This crate records the computed split; payment capture and
//! settlement happen elsewhere.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Minor-unit precision of the settlement currency.
const MINOR_UNIT_DP: u32 = 2;

/// Default platform commission rate (10%).
pub const DEFAULT_COMMISSION_RATE: Decimal = rust_decimal_macros::dec!(0.10);

/// Computed financial split for one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub gross: Decimal,
    pub commission_rate: Decimal,
    pub fee: Decimal,
    pub host_earning: Decimal,
}

fn round_minor(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits `gross` into platform fee and host earning.
///
/// Each value is independently rounded to the currency's minor unit with
/// half-away-from-zero: the fee first, then `host_earning = gross - fee`.
/// For a gross amount carrying at most two decimal places the parts
/// reconcile exactly: `fee + host_earning == gross`.
pub fn settle(gross: Decimal, commission_rate: Decimal) -> Settlement {
    let gross = round_minor(gross);
    let fee = round_minor(gross * commission_rate);
    let host_earning = round_minor(gross - fee);

    Settlement {
        gross,
        commission_rate,
        fee,
        host_earning,
    }
}
