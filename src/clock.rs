use std::time::{Duration, Instant};

/// Wall-clock progress generator for one transition.
///
/// Progress is monotonic in [0, 1]. A zero duration is complete from the
/// start and never produces animation frames. `stop` abandons the clock
/// without ever reporting completion; `force_complete` jumps it to the end.
#[derive(Clone, Debug)]
pub struct TransitionClock {
    started: Instant,
    duration: Duration,
    forced: bool,
    stopped_at: Option<f64>,
}

impl TransitionClock {
    pub fn start(duration_millis: u64) -> Self {
        Self {
            started: Instant::now(),
            duration: Duration::from_millis(duration_millis),
            forced: false,
            stopped_at: None,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress_at(Instant::now())
    }

    pub fn progress_at(&self, now: Instant) -> f64 {
        if self.forced {
            return 1.0;
        }
        if let Some(frozen) = self.stopped_at {
            return frozen;
        }
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete_at(Instant::now())
    }

    pub fn is_complete_at(&self, now: Instant) -> bool {
        if self.stopped_at.is_some() {
            return false;
        }
        self.progress_at(now) >= 1.0
    }

    /// Jump to the end; the next completion check fires.
    pub fn force_complete(&mut self) {
        self.stopped_at = None;
        self.forced = true;
    }

    /// Abandon the clock. Remaining progress is discarded and no completion
    /// is ever reported.
    pub fn stop(&mut self) {
        if !self.forced && self.stopped_at.is_none() {
            self.stopped_at = Some(self.progress());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_immediately_complete() {
        let clock = TransitionClock::start(0);
        assert_eq!(clock.progress(), 1.0);
        assert!(clock.is_complete());
    }

    #[test]
    fn progress_follows_elapsed_time() {
        let clock = TransitionClock::start(1000);
        let half = clock.started + Duration::from_millis(500);
        let done = clock.started + Duration::from_millis(1500);

        assert!(clock.progress_at(clock.started) < 1e-9);
        assert!((clock.progress_at(half) - 0.5).abs() < 1e-9);
        assert_eq!(clock.progress_at(done), 1.0);
        assert!(clock.is_complete_at(done));
        assert!(!clock.is_complete_at(half));
    }

    #[test]
    fn force_complete_jumps_to_end() {
        let mut clock = TransitionClock::start(60_000);
        assert!(!clock.is_complete());
        clock.force_complete();
        assert_eq!(clock.progress(), 1.0);
        assert!(clock.is_complete());
    }

    #[test]
    fn stop_freezes_without_completing() {
        let mut clock = TransitionClock::start(60_000);
        clock.stop();
        let frozen = clock.progress();
        assert!(frozen < 1.0);
        assert!(!clock.is_complete());
        assert_eq!(clock.progress(), frozen);
    }
}
