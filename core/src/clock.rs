use std::time::{Duration, Instant};

use crate::constants::tick_period;

/// What a call to `Ticker::poll` is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The tick's budget is spent; do nothing until the next one
    Gated,
    /// The first slot of a new tick; timers are due
    Tick,
    /// Another slot within the current tick
    Spare,
}

/// # Ticker
/// Gates execution to a fixed tick rate.
///
/// Every tick hands out `per_tick` slots which are used up one per `poll`. Polls that arrive
/// once they are all used, and before the next tick is due, are `Gated`.
/// A driver that falls more than a whole period behind skips the ticks it missed rather than
/// bursting through them.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    per_tick: u32,
    next_tick: Option<Instant>,
    remaining: u32,
}

impl Ticker {
    pub fn new(rate: u32, per_tick: u32) -> Self {
        Ticker {
            period: tick_period(rate),
            per_tick: per_tick.max(1),
            next_tick: None,
            remaining: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Claims a slot at time `now`
    pub fn poll(&mut self, now: Instant) -> Slot {
        let due = match self.next_tick {
            Some(next_tick) => now >= next_tick,
            None => true,
        };

        if due {
            self.next_tick = Some(match self.next_tick {
                Some(next_tick) if now - next_tick < self.period => next_tick + self.period,
                _ => now + self.period,
            });
            self.remaining = self.per_tick - 1;
            Slot::Tick
        } else if self.remaining > 0 {
            self.remaining -= 1;
            Slot::Spare
        } else {
            Slot::Gated
        }
    }
}
