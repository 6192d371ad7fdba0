use std::time::{Duration, Instant};

/// Active-time clock of a capture. Paused time never counts.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    capture_start: Instant,
    paused_duration: Duration,
    last_pause_time: Option<Instant>,
}

impl RecordingClock {
    pub fn start() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(now: Instant) -> Self {
        Self {
            capture_start: now,
            paused_duration: Duration::ZERO,
            last_pause_time: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.last_pause_time.is_some()
    }

    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.last_pause_time.is_none() {
            self.last_pause_time = Some(now);
        }
    }

    pub fn resume_at(&mut self, now: Instant) {
        if let Some(pause_start) = self.last_pause_time.take() {
            self.paused_duration += now.saturating_duration_since(pause_start);
        }
    }

    /// Active time up to `now`. A pause still in progress is excluded too.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let total = now.saturating_duration_since(self.capture_start);
        let ongoing = self
            .last_pause_time
            .map(|p| now.saturating_duration_since(p))
            .unwrap_or(Duration::ZERO);
        total.saturating_sub(self.paused_duration + ongoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_time_is_excluded() {
        let t0 = Instant::now();
        let mut clock = RecordingClock::started_at(t0);

        clock.pause_at(t0 + Duration::from_millis(1000));
        clock.resume_at(t0 + Duration::from_millis(3000));

        assert_eq!(clock.elapsed_at(t0 + Duration::from_millis(4000)), Duration::from_millis(2000));
    }

    #[test]
    fn ongoing_pause_is_excluded() {
        let t0 = Instant::now();
        let mut clock = RecordingClock::started_at(t0);

        clock.pause_at(t0 + Duration::from_millis(500));

        assert!(clock.is_paused());
        assert_eq!(clock.elapsed_at(t0 + Duration::from_millis(2500)), Duration::from_millis(500));
    }

    #[test]
    fn double_pause_keeps_first_timestamp() {
        let t0 = Instant::now();
        let mut clock = RecordingClock::started_at(t0);

        clock.pause_at(t0 + Duration::from_millis(100));
        clock.pause_at(t0 + Duration::from_millis(900));
        clock.resume_at(t0 + Duration::from_millis(1100));

        assert_eq!(clock.elapsed_at(t0 + Duration::from_millis(1100)), Duration::from_millis(100));
    }

    #[test]
    fn resume_without_pause_is_noop() {
        let t0 = Instant::now();
        let mut clock = RecordingClock::started_at(t0);
        clock.resume_at(t0 + Duration::from_millis(10));
        assert_eq!(clock.elapsed_at(t0 + Duration::from_millis(50)), Duration::from_millis(50));
    }
}
