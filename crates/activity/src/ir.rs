use serde::{Deserialize, Serialize};

use crate::Channel;

/// An infrared proximity sensor with one tick of history.
#[derive(Debug, Clone)]
pub struct IrSensor {
    channel: Channel,
    current: f32,
    prior: f32,
    primed: bool,
}

impl IrSensor {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            current: 0.0,
            prior: 0.0,
            primed: false,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    /// Records a new sample and returns the change since the previous one.
    ///
    /// The very first sample only fills the history and reports no change.
    pub fn update(&mut self, sample: f32) -> f32 {
        if !self.primed {
            self.primed = true;
            self.current = sample;
            self.prior = sample;
            return 0.0;
        }

        self.prior = self.current;
        self.current = sample;
        self.current - self.prior
    }
}

/// How many activity units a triggering IR delta is worth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthPolicy {
    /// Every triggering delta is worth a single unit.
    Unit,
    /// One unit per started `step` of delta.
    Proportional { step: f32 },
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        GrowthPolicy::Proportional { step: 0.01 }
    }
}

/// Turns IR deltas into activity units. Only deltas above `threshold` count;
/// receding objects never reduce activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrTrigger {
    pub threshold: f32,
    pub policy: GrowthPolicy,
}

impl IrTrigger {
    pub fn units(&self, delta: f32) -> u32 {
        if delta <= self.threshold {
            return 0;
        }

        match self.policy {
            GrowthPolicy::Unit => 1,
            GrowthPolicy::Proportional { step } => ((delta / step).ceil() as u32).max(1),
        }
    }
}
