use std::{
    fmt::{self, Debug, Display},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("sound file {} does not exist", .0.display())]
    MissingAsset(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed waiting for playback: {0}")]
    Wait(#[source] std::io::Error),

    #[error("playing {} failed with {status}", .asset.display())]
    Failed { asset: PathBuf, status: ExitStatus },
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid volume {0:?}, expected a number or a decibel offset like \"-6dB\"")]
pub struct ParseVolumeError(String);

/// Playback volume, either a linear multiplier or a decibel offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VolumeRepr", into = "VolumeRepr")]
pub enum Volume {
    Linear(f32),
    Decibels(f32),
}

impl Default for Volume {
    fn default() -> Self {
        Volume::Linear(1.0)
    }
}

impl Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Volume::Linear(gain) => write!(f, "{gain}"),
            Volume::Decibels(db) => write!(f, "{db}dB"),
        }
    }
}

impl FromStr for Volume {
    type Err = ParseVolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ParseVolumeError(s.to_owned());

        let lower = trimmed.to_ascii_lowercase();
        if let Some(db) = lower.strip_suffix("db") {
            db.trim().parse().map(Volume::Decibels).map_err(|_| invalid())
        } else {
            trimmed.parse().map(Volume::Linear).map_err(|_| invalid())
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VolumeRepr {
    Linear(f32),
    Text(String),
}

impl TryFrom<VolumeRepr> for Volume {
    type Error = ParseVolumeError;

    fn try_from(repr: VolumeRepr) -> Result<Self, Self::Error> {
        match repr {
            VolumeRepr::Linear(gain) => Ok(Volume::Linear(gain)),
            VolumeRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Volume> for VolumeRepr {
    fn from(volume: Volume) -> Self {
        match volume {
            Volume::Linear(gain) => VolumeRepr::Linear(gain),
            Volume::Decibels(_) => VolumeRepr::Text(volume.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub asset: PathBuf,
    pub speed: f32,
    pub volume: Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    /// Return once the clip has finished playing.
    Blocking,
    /// Return as soon as playback has started.
    Background,
}

/// A single clip being played.
pub trait Playback: Send + Debug {
    fn wait(&mut self) -> Result<(), PlaybackError>;

    fn try_finished(&mut self) -> Result<bool, PlaybackError>;
}

/// The facility that turns sound files into audio. Implementations must be
/// safe to call from several threads at once; overlapping clips simply layer.
pub trait Player: Send + Sync + Debug {
    fn start(&self, request: &PlayRequest) -> Result<Box<dyn Playback>, PlaybackError>;

    fn play(
        &self,
        request: &PlayRequest,
        mode: PlayMode,
    ) -> Result<Box<dyn Playback>, PlaybackError> {
        let mut playback = self.start(request)?;
        if mode == PlayMode::Blocking {
            playback.wait()?;
        }
        Ok(playback)
    }
}

/// Plays clips by running sox's `play` command, one process per clip.
#[derive(Debug, Clone)]
pub struct SoxPlayer {
    program: String,
}

impl Default for SoxPlayer {
    fn default() -> Self {
        Self::new("play")
    }
}

impl SoxPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, request: &PlayRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-q")
            .arg(&request.asset)
            .arg("vol")
            .arg(request.volume.to_string())
            .arg("tempo")
            .arg(request.speed.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

impl Player for SoxPlayer {
    fn start(&self, request: &PlayRequest) -> Result<Box<dyn Playback>, PlaybackError> {
        if !request.asset.is_file() {
            return Err(PlaybackError::MissingAsset(request.asset.clone()));
        }

        let child = self
            .command(request)
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        Ok(Box::new(SoxPlayback {
            asset: request.asset.clone(),
            child,
        }))
    }
}

#[derive(Debug)]
struct SoxPlayback {
    asset: PathBuf,
    child: Child,
}

impl SoxPlayback {
    fn check(&self, status: ExitStatus) -> Result<(), PlaybackError> {
        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError::Failed {
                asset: self.asset.clone(),
                status,
            })
        }
    }
}

impl Playback for SoxPlayback {
    fn wait(&mut self) -> Result<(), PlaybackError> {
        let status = self.child.wait().map_err(PlaybackError::Wait)?;
        self.check(status)
    }

    fn try_finished(&mut self) -> Result<bool, PlaybackError> {
        match self.child.try_wait().map_err(PlaybackError::Wait)? {
            Some(status) => self.check(status).map(|()| true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_parses_linear_and_decibels() {
        assert_eq!(Ok(Volume::Linear(0.5)), "0.5".parse());
        assert_eq!(Ok(Volume::Decibels(-6.0)), "-6dB".parse());
        assert_eq!(Ok(Volume::Decibels(3.0)), " 3 db ".parse());
        assert!("loud".parse::<Volume>().is_err());
        assert!("dB".parse::<Volume>().is_err());
    }

    #[test]
    fn volume_renders_sox_arguments() {
        assert_eq!("0.5", Volume::Linear(0.5).to_string());
        assert_eq!("-6dB", Volume::Decibels(-6.0).to_string());
    }

    #[test]
    fn volume_json_forms() {
        let volumes: Vec<Volume> = serde_json::from_str(r#"[0.25, "-12dB", "2"]"#).unwrap();
        assert_eq!(
            vec![
                Volume::Linear(0.25),
                Volume::Decibels(-12.0),
                Volume::Linear(2.0)
            ],
            volumes
        );

        assert_eq!(
            r#"[0.25,"-12dB"]"#,
            serde_json::to_string(&[Volume::Linear(0.25), Volume::Decibels(-12.0)]).unwrap()
        );
    }

    #[test]
    fn sox_command_line() {
        let player = SoxPlayer::new("play");
        let request = PlayRequest {
            asset: PathBuf::from("/sounds/inhale_1.wav"),
            speed: 1.5,
            volume: Volume::Decibels(-3.0),
        };

        let command = player.command(&request);
        assert_eq!("play", command.get_program());
        itertools::assert_equal(
            command.get_args(),
            ["-q", "/sounds/inhale_1.wav", "vol", "-3dB", "tempo", "1.5"],
        );
    }

    #[test]
    fn sox_player_rejects_missing_assets() {
        let player = SoxPlayer::default();
        let request = PlayRequest {
            asset: PathBuf::from("/definitely/not/here.wav"),
            speed: 1.0,
            volume: Volume::default(),
        };

        assert!(matches!(
            player.start(&request),
            Err(PlaybackError::MissingAsset(_))
        ));
    }
}
