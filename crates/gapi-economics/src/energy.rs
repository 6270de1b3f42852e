//! # Energy Regeneration
//!
//! Energy is the rate-limited play resource. One point regenerates per
//! recovery period, up to `energy_full`.
//!
//! ```text
//!   anchor                      now
//!     │◄── period ──►│◄── period ──►│◄─ partial ─►│
//!     └──────── +1 ──┴──────── +1 ──┘
//!   new anchor = anchor + 2 * period   (partial progress kept)
//! ```
//!
//! Regeneration is lazy: nothing runs on a timer. The service computes the
//! points owed whenever a player's info is read and persists them together
//! with the advanced anchor. Points above a lowered cap are trimmed the same
//! way, with a negative refill that leaves the anchor alone.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use gapi_core::types::Player;
use std::time::Duration;

use crate::constants::{DEFAULT_ENERGY_FULL, DEFAULT_RECOVERY_PERIOD};

/// Points to add and where the regeneration anchor moves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Refill {
    pub points: i32,
    pub refilled_at: DateTime<Utc>,
}

/// Pure energy math
pub struct EnergyModel;

impl EnergyModel {
    /// Replace non-positive settings with the defaults
    pub fn effective_limits(energy_full: i32, recovery_period: Duration) -> (i32, Duration) {
        let full = if energy_full <= 0 {
            DEFAULT_ENERGY_FULL
        } else {
            energy_full
        };
        let period = if recovery_period.is_zero() {
            DEFAULT_RECOVERY_PERIOD
        } else {
            recovery_period
        };
        (full, period)
    }

    /// Whole points regenerated since `energy_refilled_at`, clamped to the cap
    pub fn recovery_points(
        player: &Player,
        energy_full: i32,
        recovery_period: Duration,
        now: DateTime<Utc>,
    ) -> i32 {
        let (full, period) = Self::effective_limits(energy_full, recovery_period);

        if player.energy_points >= full {
            return 0;
        }

        let period_secs = period.as_secs().max(1) as i64;
        let elapsed_secs = (now - player.energy_refilled_at).num_seconds();
        if elapsed_secs < period_secs {
            return 0;
        }

        let whole = elapsed_secs / period_secs;
        if whole <= 0 {
            return 0;
        }

        let headroom = i64::from(full - player.energy_points);
        whole.min(headroom) as i32
    }

    /// Points owed plus the advanced anchor, `None` when nothing changes
    ///
    /// The anchor moves by exactly `points * period`, never to `now`. A
    /// player above the cap gets negative points down to it.
    pub fn refill(
        player: &Player,
        energy_full: i32,
        recovery_period: Duration,
        now: DateTime<Utc>,
    ) -> Option<Refill> {
        let (full, _) = Self::effective_limits(energy_full, recovery_period);
        if player.energy_points > full {
            return Some(Refill {
                points: full - player.energy_points,
                refilled_at: player.energy_refilled_at,
            });
        }

        let points = Self::recovery_points(player, energy_full, recovery_period, now);
        if points == 0 {
            return None;
        }

        let (_, period) = Self::effective_limits(energy_full, recovery_period);
        let advance = ChronoDuration::seconds(period.as_secs() as i64 * i64::from(points));
        Some(Refill {
            points,
            refilled_at: player.energy_refilled_at + advance,
        })
    }

    /// Energy the player would have now, without mutating anything
    pub fn project(
        player: &Player,
        energy_full: i32,
        recovery_period: Duration,
        now: DateTime<Utc>,
    ) -> i32 {
        let (full, _) = Self::effective_limits(energy_full, recovery_period);
        let points =
            player.energy_points + Self::recovery_points(player, energy_full, recovery_period, now);
        points.min(full)
    }

    /// Time until the next point, `None` when already full
    pub fn next_point_in(
        player: &Player,
        energy_full: i32,
        recovery_period: Duration,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let (full, period) = Self::effective_limits(energy_full, recovery_period);
        if Self::project(player, full, period, now) >= full {
            return None;
        }

        let period_secs = period.as_secs().max(1) as i64;
        let elapsed = (now - player.energy_refilled_at).num_seconds().max(0);
        let remaining = period_secs - elapsed % period_secs;
        Some(Duration::from_secs(remaining as u64))
    }
}
