use std::{
    fmt, io,
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use derivative::Derivative;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::{
    assets::SoundPool,
    playback::{PlayMode, PlayRequest, PlaybackError, Player, Volume},
    shutdown::ShutdownSignal,
    speed::SpeedReceiver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breath {
    Inhale,
    Exhale,
}

impl Breath {
    fn other(self) -> Self {
        match self {
            Breath::Inhale => Breath::Exhale,
            Breath::Exhale => Breath::Inhale,
        }
    }
}

impl fmt::Display for Breath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breath::Inhale => f.write_str("inhale"),
            Breath::Exhale => f.write_str("exhale"),
        }
    }
}

/// Endless inhale, exhale, inhale, ... sequence, each breath drawn at random
/// from its pool. `None` marks a breath whose pool is empty.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct BreathCycle {
    inhale: SoundPool,
    exhale: SoundPool,
    next: Breath,
    #[derivative(Debug = "ignore")]
    rng: StdRng,
}

impl BreathCycle {
    pub fn new(inhale: SoundPool, exhale: SoundPool) -> Self {
        Self::with_rng(inhale, exhale, StdRng::from_os_rng())
    }

    pub fn with_rng(inhale: SoundPool, exhale: SoundPool, rng: StdRng) -> Self {
        Self {
            inhale,
            exhale,
            next: Breath::Inhale,
            rng,
        }
    }
}

impl Iterator for BreathCycle {
    type Item = (Breath, Option<PathBuf>);

    fn next(&mut self) -> Option<Self::Item> {
        let breath = self.next;
        self.next = breath.other();

        let pool = match breath {
            Breath::Inhale => &self.inhale,
            Breath::Exhale => &self.exhale,
        };
        Some((breath, pool.choose(&mut self.rng).map(PathBuf::from)))
    }
}

#[derive(Debug)]
pub enum BreathStep {
    Played(PlayRequest),
    Failed(PlayRequest, PlaybackError),
    EmptyPool(Breath),
}

/// Plays the breathing sounds back to back, each at the latest commanded
/// speed. A new speed is only picked up between two clips.
#[derive(Debug)]
pub struct BreathPlayer {
    player: Arc<dyn Player>,
    cycle: BreathCycle,
    speed: SpeedReceiver,
    volume: Volume,
    retry_delay: Duration,
}

impl BreathPlayer {
    pub fn new(
        player: Arc<dyn Player>,
        cycle: BreathCycle,
        speed: SpeedReceiver,
        volume: Volume,
        retry_delay: Duration,
    ) -> Self {
        Self {
            player,
            cycle,
            speed,
            volume,
            retry_delay,
        }
    }

    /// Plays the next breath to completion. Returns `None` once no speed can
    /// ever arrive.
    pub fn breathe(&mut self) -> Option<BreathStep> {
        let speed = self.speed.latest()?;

        // PANIC: the cycle never ends
        let (breath, asset) = self.cycle.next().unwrap();
        let Some(asset) = asset else {
            return Some(BreathStep::EmptyPool(breath));
        };

        let request = PlayRequest {
            asset,
            speed,
            volume: self.volume,
        };

        Some(match self.player.play(&request, PlayMode::Blocking) {
            Ok(_) => BreathStep::Played(request),
            Err(err) => BreathStep::Failed(request, err),
        })
    }

    pub fn run(mut self, shutdown: ShutdownSignal) {
        info!("Breathing started");

        while !shutdown.is_triggered() {
            let Some(step) = self.breathe() else {
                info!("Speed channel closed");
                break;
            };

            let backoff = match step {
                BreathStep::Played(request) => {
                    debug!("Breathing speed: {:.3}", request.speed);
                    false
                }
                BreathStep::Failed(_, err) => {
                    warn!("Breath failed: {err}");
                    true
                }
                BreathStep::EmptyPool(breath) => {
                    warn!("No {breath} sounds to play");
                    true
                }
            };

            if backoff && shutdown.wait_timeout(self.retry_delay) {
                break;
            }
        }

        info!("Breathing stopped");
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("breath".to_owned())
            .spawn(move || self.run(shutdown))
    }
}
