use std::time::{Duration, Instant};

/// Weight of the previous estimate in [`Throughput`].
pub const MOMENTUM: f64 = 0.9;

/// Exponential moving average of per-chunk throughput, in bytes/s.
#[derive(Debug, Clone)]
pub struct Throughput {
    momentum: f64,
    speed: f64,
    bytes: u64,
    started: Instant,
    last: Instant,
}

impl Default for Throughput {
    fn default() -> Self {
        Self::new()
    }
}

impl Throughput {
    pub fn new() -> Self {
        Self::with_momentum(MOMENTUM)
    }

    pub fn with_momentum(momentum: f64) -> Self {
        let now = Instant::now();
        Self {
            momentum: momentum.clamp(0.0, 1.0),
            speed: 0.0,
            bytes: 0,
            started: now,
            last: now,
        }
    }

    /// Records `nbytes` that arrived since the previous call.
    pub fn record(&mut self, nbytes: usize) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        self.record_elapsed(nbytes, elapsed);
    }

    /// Records `nbytes` that took `elapsed` to move.
    pub fn record_elapsed(&mut self, nbytes: usize, elapsed: Duration) {
        self.bytes += nbytes as u64;
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let instant = nbytes as f64 / secs;
        self.speed = if self.speed == 0.0 {
            instant
        } else {
            self.momentum * self.speed + (1.0 - self.momentum) * instant
        };
    }

    /// Smoothed speed.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Bytes over wall time since creation.
    pub fn mean(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 { self.bytes as f64 / secs } else { 0.0 }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}
