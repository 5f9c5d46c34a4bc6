use crate::ActivityCounter;

/// Linear map from activity level onto a playback speed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedMapper {
    pub min_speed: f32,
    pub max_speed: f32,
}

impl SpeedMapper {
    pub fn new(min_speed: f32, max_speed: f32) -> Self {
        Self {
            min_speed,
            max_speed,
        }
    }

    pub fn map(&self, value: u32, max_value: u32) -> f32 {
        if max_value == 0 {
            return self.min_speed;
        }

        let level = value.min(max_value) as f32 / max_value as f32;
        self.min_speed + level * (self.max_speed - self.min_speed)
    }

    pub fn speed_for(&self, counter: &ActivityCounter) -> f32 {
        self.map(counter.value(), counter.max_value())
    }
}
