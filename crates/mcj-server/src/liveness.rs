//! Keep-alive bookkeeping for one connection.

use std::time::Duration;

use tokio::time::Instant;

/// How often the server sweeps connections.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(1);
/// How long a client has to echo a keep-alive.
pub const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// What the sweep should do with a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    /// Send a keep-alive carrying this id.
    Ping(i64),
    /// A keep-alive is in flight and not yet due.
    Wait,
    /// The outstanding keep-alive was never answered.
    TimedOut,
}

/// Outstanding keep-alive id and its deadline; `None` when nothing is in flight.
#[derive(Debug, Default)]
pub struct Liveness {
    outstanding: Option<(i64, Instant)>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the record for one sweep at `now`. `next_id` is only called
    /// when a new keep-alive is due.
    pub fn poll(&mut self, now: Instant, next_id: impl FnOnce() -> i64) -> LivenessAction {
        match self.outstanding {
            None => {
                let id = next_id();
                self.outstanding = Some((id, now + KEEP_ALIVE_TIMEOUT));
                LivenessAction::Ping(id)
            }
            Some((_, deadline)) if now >= deadline => LivenessAction::TimedOut,
            Some(_) => LivenessAction::Wait,
        }
    }

    /// Record the client's echo. Returns `false` for ids that do not match
    /// the outstanding keep-alive; those are ignored.
    pub fn acknowledge(&mut self, id: i64) -> bool {
        match self.outstanding {
            Some((expected, _)) if expected == id => {
                self.outstanding = None;
                true
            }
            _ => false,
        }
    }

    pub fn outstanding(&self) -> Option<i64> {
        self.outstanding.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simulate sweeps every `KEEP_ALIVE_INTERVAL`, answering each keep-alive after
    /// `answer_after` (or never). Returns the time at which the connection
    /// timed out, if it did within `horizon`.
    fn simulate(answer_after: Option<Duration>, horizon: Duration) -> Option<Duration> {
        let start = Instant::now();
        let mut record = Liveness::new();
        let mut next = 0i64;
        let mut pending_answer: Option<(i64, Duration)> = None;
        let mut elapsed = Duration::ZERO;

        while elapsed <= horizon {
            if let Some((id, at)) = pending_answer {
                if elapsed >= at {
                    assert!(record.acknowledge(id));
                    pending_answer = None;
                }
            }
            match record.poll(start + elapsed, || {
                next += 1;
                next
            }) {
                LivenessAction::Ping(id) => {
                    if let Some(delay) = answer_after {
                        pending_answer = Some((id, elapsed + delay));
                    }
                }
                LivenessAction::TimedOut => return Some(elapsed),
                LivenessAction::Wait => {}
            }
            elapsed += KEEP_ALIVE_INTERVAL;
        }
        None
    }

    #[test]
    fn silent_client_times_out_within_interval_plus_timeout() {
        let timed_out = simulate(None, Duration::from_secs(120)).unwrap();
        assert!(timed_out >= KEEP_ALIVE_TIMEOUT);
        assert!(timed_out <= KEEP_ALIVE_INTERVAL + KEEP_ALIVE_TIMEOUT);
    }

    #[test]
    fn responsive_client_never_times_out() {
        assert!(simulate(Some(Duration::from_secs(2)), Duration::from_secs(300)).is_none());
        assert!(simulate(Some(Duration::from_secs(29)), Duration::from_secs(300)).is_none());
    }

    #[test]
    fn one_keep_alive_in_flight_at_a_time() {
        let now = Instant::now();
        let mut record = Liveness::new();
        assert_eq!(record.poll(now, || 7), LivenessAction::Ping(7));
        assert_eq!(
            record.poll(now + Duration::from_secs(5), || unreachable!()),
            LivenessAction::Wait
        );
        assert_eq!(record.outstanding(), Some(7));
    }

    #[test]
    fn mismatched_ack_is_ignored() {
        let now = Instant::now();
        let mut record = Liveness::new();
        record.poll(now, || 42);
        assert!(!record.acknowledge(41));
        assert_eq!(record.outstanding(), Some(42));
        assert!(record.acknowledge(42));
        assert_eq!(record.outstanding(), None);
        // Late duplicate of the same id.
        assert!(!record.acknowledge(42));
    }

    #[test]
    fn overdue_keep_alive_times_out() {
        let now = Instant::now();
        let mut record = Liveness::new();
        record.poll(now, || 1);
        assert_eq!(
            record.poll(now + KEEP_ALIVE_TIMEOUT, || 2),
            LivenessAction::TimedOut
        );
    }
}
