use std::{
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::Channel;

/// Something that can be polled for the most recent raw reading of an analog
/// channel. `None` means the channel has nothing to report right now.
pub trait AnalogSource {
    fn read(&self, channel: Channel) -> Option<f32>;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    #[error("channel {channel} produced only {collected} valid readings within {timeout:?}")]
    Starved {
        channel: Channel,
        collected: usize,
        timeout: Duration,
    },
}

/// Median-of-N sampling of a noisy analog channel.
#[derive(Debug, Clone)]
pub struct Sampler {
    samples: usize,
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(8, Duration::from_millis(500), Duration::from_millis(1))
    }
}

impl Sampler {
    pub fn new(samples: usize, timeout: Duration, poll_interval: Duration) -> Self {
        assert!(samples > 0, "a sampler needs at least one sample");
        Self {
            samples,
            timeout,
            poll_interval,
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Collects `samples` valid readings from `channel` and returns their
    /// median. Null and non-finite readings are discarded.
    ///
    /// Consecutive reads are `poll_interval` apart, so the readings span
    /// several updates of a source that only caches its latest value.
    ///
    /// Gives up with [`SampleError::Starved`] once `timeout` has elapsed
    /// without enough valid readings.
    pub fn sample<S: AnalogSource + ?Sized>(
        &self,
        source: &S,
        channel: Channel,
    ) -> Result<f32, SampleError> {
        let start = Instant::now();
        let mut readings = Vec::with_capacity(self.samples);

        loop {
            match source.read(channel) {
                Some(reading) if reading.is_finite() => {
                    readings.push(reading);
                    if readings.len() == self.samples {
                        break;
                    }
                }
                _ => {
                    if start.elapsed() >= self.timeout {
                        return Err(SampleError::Starved {
                            channel,
                            collected: readings.len(),
                            timeout: self.timeout,
                        });
                    }
                }
            }

            if !self.poll_interval.is_zero() {
                thread::sleep(self.poll_interval);
            }
        }

        // PANIC: the loop above only breaks with `samples` (> 0) readings
        Ok(median(&mut readings).unwrap())
    }
}

/// Median of `values`, averaging the two middle values for even lengths.
/// Sorts `values` in place.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(f32::total_cmp);

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
