//! Ping/pong liveness for WebSocket peers.
//!
//! The write side pings every `ping_period`; the read side fails if no pong
//! arrives before its deadline. Pinging at 9/10 of the window leaves every
//! window with at least one ping.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    /// How long a peer may stay silent (no pong) before it is dropped.
    pub pong_wait: Duration,
    /// Upper bound for a single write, including pings.
    pub write_wait: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

impl Keepalive {
    pub fn new(pong_wait: Duration, write_wait: Duration) -> Self {
        Self {
            pong_wait,
            write_wait,
        }
    }

    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }

    /// Timer for outgoing pings. The first tick is one period from now.
    pub fn ping_timer(&self) -> Interval {
        let period = self.ping_period();
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    /// A read deadline starting now.
    pub fn read_deadline(&self) -> ReadDeadline {
        ReadDeadline {
            window: self.pong_wait,
            at: Instant::now() + self.pong_wait,
        }
    }
}

/// Moving deadline for the read side of a connection.
#[derive(Debug)]
pub struct ReadDeadline {
    window: Duration,
    at: Instant,
}

impl ReadDeadline {
    /// Push the deadline one full window past now. Called on every pong.
    pub fn extend(&mut self) {
        self.at = Instant::now() + self.window;
    }

    pub fn at(&self) -> Instant {
        self.at
    }
}
