//! Lazy server-authoritative game clock.
//!
//! No background ticker runs. The clock only advances when an operation
//! touches the session: the caller passes the current time in, elapsed
//! whole seconds since the last touch are charged to whichever color is
//! to move, and the high-water mark moves forward. Between touches the
//! stored remaining times are stale on purpose — they are settled before
//! anyone reads them.
//!
//! Every method takes time as an argument, so tests control the clock
//! completely without mocking.

use chrono::{DateTime, Utc};
use gambit_protocol::{ClockSnapshot, Color};

/// Both players' remaining time plus the lazy-elapse bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameClock {
    /// Starting allotment, kept so a restart knows what to reset to.
    pub initial_secs: u64,
    /// Seconds credited to a player after each of their moves.
    pub increment_secs: u64,
    pub white_remaining_secs: u64,
    pub black_remaining_secs: u64,
    /// Last instant elapsed time was charged up to.
    pub last_tick_utc: DateTime<Utc>,
}

impl GameClock {
    pub fn new(initial_secs: u64, increment_secs: u64, now: DateTime<Utc>) -> Self {
        Self {
            initial_secs,
            increment_secs,
            white_remaining_secs: initial_secs,
            black_remaining_secs: initial_secs,
            last_tick_utc: now,
        }
    }

    /// Resets both sides to the initial allotment and restarts the lazy
    /// elapse from `now`. Called when a game begins.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.white_remaining_secs = self.initial_secs;
        self.black_remaining_secs = self.initial_secs;
        self.last_tick_utc = now;
    }

    /// Charges whole seconds elapsed since the last tick to `active`,
    /// flooring at zero, and advances the tick mark.
    ///
    /// A `now` at or before the last tick (clock skew, same-second
    /// touches) charges nothing and leaves the mark where it was, so
    /// time never runs backwards.
    pub fn apply_elapsed(&mut self, active: Color, now: DateTime<Utc>) {
        let elapsed = (now - self.last_tick_utc).num_seconds();
        if elapsed <= 0 {
            return;
        }
        let charged = elapsed as u64;
        match active {
            Color::White => {
                self.white_remaining_secs = self.white_remaining_secs.saturating_sub(charged);
            }
            Color::Black => {
                self.black_remaining_secs = self.black_remaining_secs.saturating_sub(charged);
            }
        }
        self.last_tick_utc = now;
    }

    /// Credits the per-move increment to `mover`. Called on turn
    /// handover, after the mover's elapsed time has been settled.
    pub fn add_increment(&mut self, mover: Color) {
        if self.increment_secs == 0 {
            return;
        }
        match mover {
            Color::White => self.white_remaining_secs += self.increment_secs,
            Color::Black => self.black_remaining_secs += self.increment_secs,
        }
    }

    pub fn remaining(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white_remaining_secs,
            Color::Black => self.black_remaining_secs,
        }
    }

    /// The color whose flag has fallen, if any. White is reported first
    /// if (pathologically) both are at zero.
    pub fn exhausted_color(&self) -> Option<Color> {
        if self.white_remaining_secs == 0 {
            Some(Color::White)
        } else if self.black_remaining_secs == 0 {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Wire-level view of the clock. Only meaningful after the caller
    /// has settled elapsed time for the current instant.
    pub fn snapshot(&self, active: Color) -> ClockSnapshot {
        ClockSnapshot {
            white_remaining_secs: self.white_remaining_secs,
            black_remaining_secs: self.black_remaining_secs,
            active_color: active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        "2026-01-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_new_clock_starts_full() {
        let clock = GameClock::new(300, 0, t0());
        assert_eq!(clock.remaining(Color::White), 300);
        assert_eq!(clock.remaining(Color::Black), 300);
        assert_eq!(clock.exhausted_color(), None);
    }

    #[test]
    fn test_apply_elapsed_charges_only_active_color() {
        let mut clock = GameClock::new(300, 0, t0());
        clock.apply_elapsed(Color::White, t0() + TimeDelta::seconds(12));

        assert_eq!(clock.remaining(Color::White), 288);
        assert_eq!(clock.remaining(Color::Black), 300);
    }

    #[test]
    fn test_apply_elapsed_floors_at_zero() {
        // 301 seconds of idle against a 300-second clock: the active
        // player's time bottoms out, it never underflows.
        let mut clock = GameClock::new(300, 0, t0());
        clock.apply_elapsed(Color::Black, t0() + TimeDelta::seconds(301));

        assert_eq!(clock.remaining(Color::Black), 0);
        assert_eq!(clock.exhausted_color(), Some(Color::Black));
    }

    #[test]
    fn test_apply_elapsed_is_cumulative_across_touches() {
        let mut clock = GameClock::new(300, 0, t0());
        clock.apply_elapsed(Color::White, t0() + TimeDelta::seconds(10));
        clock.apply_elapsed(Color::White, t0() + TimeDelta::seconds(25));

        // 10 then 15 more; the tick mark advanced in between.
        assert_eq!(clock.remaining(Color::White), 275);
    }

    #[test]
    fn test_apply_elapsed_ignores_backwards_time() {
        let mut clock = GameClock::new(300, 0, t0());
        clock.apply_elapsed(Color::White, t0() - TimeDelta::seconds(5));

        assert_eq!(clock.remaining(Color::White), 300);
        assert_eq!(clock.last_tick_utc, t0());
    }

    #[test]
    fn test_sub_second_elapsed_charges_nothing() {
        let mut clock = GameClock::new(300, 0, t0());
        clock.apply_elapsed(Color::White, t0() + TimeDelta::milliseconds(900));

        assert_eq!(clock.remaining(Color::White), 300);
        // Mark must not advance either, or repeated sub-second touches
        // would let whole seconds slip through uncharged.
        assert_eq!(clock.last_tick_utc, t0());
    }

    #[test]
    fn test_add_increment_credits_mover() {
        let mut clock = GameClock::new(300, 5, t0());
        clock.apply_elapsed(Color::White, t0() + TimeDelta::seconds(8));
        clock.add_increment(Color::White);

        assert_eq!(clock.remaining(Color::White), 297);
        assert_eq!(clock.remaining(Color::Black), 300);
    }

    #[test]
    fn test_restart_refills_both_sides() {
        let mut clock = GameClock::new(300, 0, t0());
        clock.apply_elapsed(Color::White, t0() + TimeDelta::seconds(50));

        let later = t0() + TimeDelta::seconds(120);
        clock.restart(later);
        assert_eq!(clock.remaining(Color::White), 300);
        assert_eq!(clock.remaining(Color::Black), 300);
        assert_eq!(clock.last_tick_utc, later);
    }

    #[test]
    fn test_snapshot_reflects_settled_state() {
        let mut clock = GameClock::new(300, 0, t0());
        clock.apply_elapsed(Color::Black, t0() + TimeDelta::seconds(30));

        let snap = clock.snapshot(Color::Black);
        assert_eq!(snap.white_remaining_secs, 300);
        assert_eq!(snap.black_remaining_secs, 270);
        assert_eq!(snap.active_color, Color::Black);
    }
}
