use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use activity::{ActivityCounter, Channel, GrowthPolicy, IrTrigger, Sampler, SpeedMapper};
use anyhow::{Context, bail, ensure};
use engine::{assets::SoundLayout, control::ControlSettings, playback::Volume};
use serde::{Deserialize, Serialize};

/// Everything the installation can be tuned with. Every field has a default,
/// so a configuration file only needs to list what it changes. Durations are
/// in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sounds: SoundsConfig,
    pub board: BoardConfig,
    pub sensors: SensorsConfig,
    pub counter: CounterConfig,
    pub breath: BreathConfig,
    pub ambient: AmbientConfig,
    pub stems: StemsConfig,
    pub control: ControlConfig,
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundsConfig {
    /// Defaults to `~/FLG_sounds`.
    pub root: Option<PathBuf>,
    pub layout: SoundLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub enabled: bool,
    pub device_prefix: String,
    pub device_count: u32,
    /// How long to wait for the board to boot after opening it.
    pub setup_wait_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_prefix: "/dev/ttyACM".to_owned(),
            device_count: 40,
            setup_wait_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub ir_channels: Vec<Channel>,
    pub ir_threshold: f32,
    pub growth: GrowthPolicy,
    pub felt_channels: Vec<Channel>,
    pub felt_threshold: f32,
    pub samples: usize,
    pub sample_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            ir_channels: vec![0, 1],
            ir_threshold: 0.05,
            growth: GrowthPolicy::default(),
            felt_channels: vec![2],
            felt_threshold: 0.9,
            samples: 8,
            sample_timeout_ms: 500,
            poll_interval_ms: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub max_value: u32,
    /// Fractional, the default debounce is well below a millisecond.
    pub growth_limit_ms: f64,
    pub decay_rate_ms: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            max_value: 60,
            growth_limit_ms: 0.3,
            decay_rate_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathConfig {
    pub min_speed: f32,
    pub max_speed: f32,
    pub volume: Volume,
    pub retry_delay_ms: u64,
}

impl Default for BreathConfig {
    fn default() -> Self {
        Self {
            min_speed: 0.6,
            max_speed: 2.0,
            volume: Volume::default(),
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub enabled: bool,
    pub volume: Volume,
    pub pause_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: Volume::Linear(0.5),
            pause_ms: 100,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StemsConfig {
    pub volume: Volume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub tick_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { tick_ms: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// The sox front end used to play clips.
    pub program: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: "play".to_owned(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing configuration {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let breath = &self.breath;
        ensure!(
            breath.min_speed > 0.0 && breath.min_speed.is_finite(),
            "breath.min_speed must be positive, got {}",
            breath.min_speed
        );
        ensure!(
            breath.min_speed <= breath.max_speed && breath.max_speed.is_finite(),
            "breath.min_speed ({}) must not exceed breath.max_speed ({})",
            breath.min_speed,
            breath.max_speed
        );
        ensure!(self.counter.max_value > 0, "counter.max_value must be at least 1");
        ensure!(
            Duration::try_from_secs_f64(self.counter.growth_limit_ms / 1000.0).is_ok(),
            "counter.growth_limit_ms must be a non-negative number of milliseconds, got {}",
            self.counter.growth_limit_ms
        );
        ensure!(self.sensors.samples > 0, "sensors.samples must be at least 1");
        ensure!(self.control.tick_ms > 0, "control.tick_ms must be at least 1");

        if let GrowthPolicy::Proportional { step } = self.sensors.growth {
            if !(step > 0.0 && step.is_finite()) {
                bail!("sensors.growth.step must be positive, got {step}");
            }
        }

        Ok(())
    }

    /// The configured sound root, or `~/FLG_sounds`.
    pub fn sound_root(&self) -> anyhow::Result<PathBuf> {
        match &self.sounds.root {
            Some(root) => Ok(root.clone()),
            None => dirs::home_dir()
                .map(|home| home.join("FLG_sounds"))
                .context("no sound root configured and no home directory to default to"),
        }
    }

    pub fn control_settings(&self) -> ControlSettings {
        let sensors = &self.sensors;
        ControlSettings {
            tick: Duration::from_millis(self.control.tick_ms),
            sampler: Sampler::new(
                sensors.samples,
                Duration::from_millis(sensors.sample_timeout_ms),
                Duration::from_millis(sensors.poll_interval_ms),
            ),
            ir_channels: sensors.ir_channels.clone(),
            ir_trigger: IrTrigger {
                threshold: sensors.ir_threshold,
                policy: sensors.growth,
            },
            felt_channels: sensors.felt_channels.clone(),
            felt_threshold: sensors.felt_threshold,
            mapper: SpeedMapper::new(self.breath.min_speed, self.breath.max_speed),
        }
    }

    /// Expects a validated configuration.
    pub fn counter(&self, now: Instant) -> ActivityCounter {
        ActivityCounter::new(
            self.counter.max_value,
            Duration::try_from_secs_f64(self.counter.growth_limit_ms / 1000.0)
                .unwrap_or_default(),
            Duration::from_millis(self.counter.decay_rate_ms),
            now,
        )
    }
}
