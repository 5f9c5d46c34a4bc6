use std::{path::PathBuf, sync::Arc};

use derivative::Derivative;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::{
    assets::SoundPool,
    playback::{PlayMode, PlayRequest, Playback, Player, Volume},
};

/// Fires one-shot stem sounds and keeps track of them until they finish.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct StemTrigger {
    player: Arc<dyn Player>,
    stems: SoundPool,
    volume: Volume,
    #[derivative(Debug = "ignore")]
    rng: StdRng,
    in_flight: Vec<Box<dyn Playback>>,
}

impl StemTrigger {
    pub fn new(player: Arc<dyn Player>, stems: SoundPool, volume: Volume) -> Self {
        Self::with_rng(player, stems, volume, StdRng::from_os_rng())
    }

    pub fn with_rng(player: Arc<dyn Player>, stems: SoundPool, volume: Volume, rng: StdRng) -> Self {
        Self {
            player,
            stems,
            volume,
            rng,
            in_flight: Vec::new(),
        }
    }

    /// Starts a random stem without waiting for it. Returns the stem that
    /// started playing, if any.
    pub fn fire(&mut self) -> Option<PathBuf> {
        let Some(asset) = self.stems.choose(&mut self.rng) else {
            warn!("No stem sounds to play");
            return None;
        };

        let request = PlayRequest {
            asset: asset.to_path_buf(),
            speed: 1.0,
            volume: self.volume,
        };

        match self.player.play(&request, PlayMode::Background) {
            Ok(playback) => {
                debug!("Stem: {}", request.asset.display());
                self.in_flight.push(playback);
                Some(request.asset)
            }
            Err(err) => {
                warn!("Stem failed: {err}");
                None
            }
        }
    }

    /// Forgets stems that have finished playing.
    pub fn reap(&mut self) {
        self.in_flight
            .retain_mut(|playback| match playback.try_finished() {
                Ok(finished) => !finished,
                Err(err) => {
                    warn!("Stem failed: {err}");
                    false
                }
            });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
