//! Ping/pong liveness tracking for a single socket.
//!
//! The connection loop pings every `interval`. Each ping arms a pong
//! deadline `timeout` later unless one is already armed; any pong disarms
//! it. A socket whose deadline passes is considered dead and terminated.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    AwaitingPong { deadline: Instant },
    Dead,
}

#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    timeout: Duration,
    state: Liveness,
}

impl Heartbeat {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            // tokio intervals panic on a zero period
            interval: interval.max(Duration::from_millis(1)),
            timeout,
            state: Liveness::Alive,
        }
    }

    /// Ticker for the ping cadence; the first ping goes out one interval after connect.
    pub fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    pub fn state(&self) -> Liveness {
        self.state
    }

    pub fn ping_sent(&mut self, now: Instant) {
        if self.state == Liveness::Alive {
            self.state = Liveness::AwaitingPong {
                deadline: now + self.timeout,
            };
        }
    }

    pub fn pong_received(&mut self) {
        if let Liveness::AwaitingPong { .. } = self.state {
            self.state = Liveness::Alive;
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            Liveness::AwaitingPong { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Marks the socket dead once the armed deadline has passed.
    pub fn check(&mut self, now: Instant) -> Liveness {
        if let Liveness::AwaitingPong { deadline } = self.state {
            if now >= deadline {
                self.state = Liveness::Dead;
            }
        }
        self.state
    }

    /// Resolves when the armed pong deadline passes; never resolves while alive.
    pub async fn expired(&self) {
        match self.deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat() -> Heartbeat {
        Heartbeat::new(Duration::from_secs(3), Duration::from_secs(1))
    }

    #[test]
    fn pong_before_deadline_keeps_socket_alive() {
        let mut hb = heartbeat();
        let start = Instant::now();
        hb.ping_sent(start);
        assert_eq!(hb.deadline(), Some(start + Duration::from_secs(1)));

        hb.pong_received();
        assert_eq!(hb.check(start + Duration::from_secs(5)), Liveness::Alive);
        assert_eq!(hb.deadline(), None);
    }

    #[test]
    fn missing_pong_kills_socket_at_deadline() {
        let mut hb = heartbeat();
        let start = Instant::now();
        hb.ping_sent(start);
        assert!(matches!(
            hb.check(start + Duration::from_millis(999)),
            Liveness::AwaitingPong { .. }
        ));
        assert_eq!(hb.check(start + Duration::from_secs(1)), Liveness::Dead);
    }

    #[test]
    fn second_ping_keeps_earlier_deadline() {
        let mut hb = heartbeat();
        let start = Instant::now();
        hb.ping_sent(start);
        hb.ping_sent(start + Duration::from_millis(500));
        assert_eq!(hb.deadline(), Some(start + Duration::from_secs(1)));
    }

    #[test]
    fn dead_socket_stays_dead() {
        let mut hb = heartbeat();
        let start = Instant::now();
        hb.ping_sent(start);
        hb.check(start + Duration::from_secs(2));
        hb.pong_received();
        hb.ping_sent(start + Duration::from_secs(3));
        assert_eq!(hb.state(), Liveness::Dead);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_fires_only_after_timeout() {
        let mut hb = heartbeat();
        hb.ping_sent(Instant::now());

        let early = tokio::time::timeout(Duration::from_millis(900), hb.expired()).await;
        assert!(early.is_err());

        tokio::time::timeout(Duration::from_millis(200), hb.expired())
            .await
            .expect("deadline should have passed");
        assert_eq!(hb.check(Instant::now()), Liveness::Dead);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_waits_one_interval_before_first_ping() {
        let hb = heartbeat();
        let start = Instant::now();
        let mut ticker = hb.ticker();
        ticker.tick().await;
        assert!(Instant::now() - start >= Duration::from_secs(3));
    }
}
