use std::{
    io,
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{info, warn};

use crate::{
    playback::{PlayMode, PlayRequest, PlaybackError, Player, Volume},
    shutdown::ShutdownSignal,
};

/// Replays the ambient sound forever at normal speed, independent of any
/// sensor input.
#[derive(Debug)]
pub struct LoopPlayer {
    player: Arc<dyn Player>,
    request: PlayRequest,
    pause: Duration,
    retry_delay: Duration,
}

impl LoopPlayer {
    pub fn new(
        player: Arc<dyn Player>,
        asset: PathBuf,
        volume: Volume,
        pause: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            player,
            request: PlayRequest {
                asset,
                speed: 1.0,
                volume,
            },
            pause,
            retry_delay,
        }
    }

    pub fn play_once(&self) -> Result<(), PlaybackError> {
        self.player
            .play(&self.request, PlayMode::Blocking)
            .map(|_| ())
    }

    pub fn run(self, shutdown: ShutdownSignal) {
        info!("Ambient loop started: {}", self.request.asset.display());

        while !shutdown.is_triggered() {
            let delay = match self.play_once() {
                Ok(()) => self.pause,
                Err(err) => {
                    warn!("Ambient loop failed: {err}");
                    self.retry_delay
                }
            };

            if shutdown.wait_timeout(delay) {
                break;
            }
        }

        info!("Ambient loop stopped");
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("ambient".to_owned())
            .spawn(move || self.run(shutdown))
    }
}
