//! Per-move time allocation.

use crate::SearchLimits;
use graphite_core::Color;
use std::time::Duration;

/// Soft and hard deadlines for one move.
///
/// The soft target is what the search aims for; iterative deepening will
/// not start another iteration once it is mostly spent. The hard deadline
/// is an emergency brake at twice the target for when the search is caught
/// mid-iteration. A `movetime` override is exact: both deadlines coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    pub soft: Option<Duration>,
    pub hard: Option<Duration>,
}

impl TimeBudget {
    /// No deadline at all (`go infinite`, or depth/node limited searches).
    pub const UNLIMITED: TimeBudget = TimeBudget {
        soft: None,
        hard: None,
    };
}

/// Chooses a move-time budget from the clock state.
pub struct TimeManager;

impl TimeManager {
    /// Margin always left on the clock.
    const SAFETY_MS: u64 = 100;

    pub fn allocate(limits: &SearchLimits, side: Color) -> TimeBudget {
        if let Some(ms) = limits.movetime {
            let d = Duration::from_millis(ms);
            return TimeBudget {
                soft: Some(d),
                hard: Some(d),
            };
        }
        if limits.infinite {
            return TimeBudget::UNLIMITED;
        }

        let (time, inc) = match side {
            Color::White => (limits.wtime, limits.winc.unwrap_or(0)),
            Color::Black => (limits.btime, limits.binc.unwrap_or(0)),
        };
        let Some(time) = time else {
            return TimeBudget::UNLIMITED;
        };

        let base = match limits.movestogo {
            Some(mtg) if mtg > 0 => time / mtg as u64,
            _ => time / 40,
        };
        let mut budget = base + inc * 3 / 4;

        // At most a fifth of the clock, and never run it to zero.
        budget = budget.min(time / 5);
        budget = budget.min(time.saturating_sub(Self::SAFETY_MS));

        let hard = (budget * 2).min(time.saturating_sub(Self::SAFETY_MS));
        TimeBudget {
            soft: Some(Duration::from_millis(budget)),
            hard: Some(Duration::from_millis(hard)),
        }
    }
}
