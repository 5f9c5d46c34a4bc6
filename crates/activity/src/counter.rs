use std::time::{Duration, Instant};

/// Bounded activity level with rate-limited growth and slow, steady decay.
///
/// `value` always stays within `0..=max_value`. Growth is debounced by
/// `growth_limit`: an [`add`](Self::add) arriving sooner than that after the
/// previous successful growth is dropped. Decay removes a single unit per
/// [`tick`](Self::tick) once `decay_rate` has passed since the previous decay
/// step, without catching up on missed periods.
#[derive(Debug, Clone)]
pub struct ActivityCounter {
    value: u32,
    max_value: u32,
    decay_rate: Duration,
    growth_limit: Duration,
    last_decay: Instant,
    last_grow: Instant,
}

impl ActivityCounter {
    pub fn new(max_value: u32, growth_limit: Duration, decay_rate: Duration, now: Instant) -> Self {
        Self {
            value: 0,
            max_value,
            decay_rate,
            growth_limit,
            last_decay: now,
            last_grow: now,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    /// Applies at most one decay step. Returns `true` if the value dropped.
    ///
    /// The decay clock restarts whenever a period has elapsed, even at rest,
    /// so freshly gained activity starts decaying within one period.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_decay) <= self.decay_rate {
            return false;
        }

        self.last_decay = now;
        if self.value > 0 {
            self.value -= 1;
            true
        } else {
            false
        }
    }

    /// Grows the counter by up to `n` units, returning how many were added.
    pub fn add(&mut self, n: u32, now: Instant) -> u32 {
        if n == 0 || now.saturating_duration_since(self.last_grow) <= self.growth_limit {
            return 0;
        }

        let added = n.min(self.max_value - self.value);
        self.value += added;
        self.last_grow = now;
        added
    }
}
