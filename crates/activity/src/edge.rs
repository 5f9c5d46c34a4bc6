use crate::Channel;

/// Fires once per rising edge of a binary signal.
#[derive(Debug, Clone, Default)]
pub struct EdgeDetector {
    current: bool,
    prior: bool,
}

impl EdgeDetector {
    /// Feeds the next state, returning `true` on a `false -> true` transition.
    pub fn update(&mut self, state: bool) -> bool {
        self.prior = self.current;
        self.current = state;
        self.current && !self.prior
    }

    pub fn is_high(&self) -> bool {
        self.current
    }
}

/// A contact sensor: the de-noised analog sample is thresholded into a binary
/// touch state, and only the moment of touching counts as an event.
#[derive(Debug, Clone)]
pub struct FeltSensor {
    channel: Channel,
    threshold: f32,
    edge: EdgeDetector,
}

impl FeltSensor {
    pub fn new(channel: Channel, threshold: f32) -> Self {
        Self {
            channel,
            threshold,
            edge: EdgeDetector::default(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_touched(&self) -> bool {
        self.edge.is_high()
    }

    /// Returns `true` when this sample starts a new touch.
    pub fn update(&mut self, sample: f32) -> bool {
        self.edge.update(sample >= self.threshold)
    }
}
