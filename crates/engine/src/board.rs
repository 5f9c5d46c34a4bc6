use std::path::{Path, PathBuf};

use activity::{AnalogSource, Channel};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write to board: {0}")]
    Write(#[from] std::io::Error),

    #[error("channel {0} is not an analog input")]
    InvalidChannel(Channel),
}

/// A connected sensor board exposing analog channels.
pub trait Board: AnalogSource + Send {
    /// Asks the board to start reporting `channel`.
    fn enable_channel(&mut self, channel: Channel) -> Result<(), BoardError>;

    fn name(&self) -> &str;
}

/// Knows how to open a board on a device path.
pub trait BoardConnector {
    fn connect(&self, device: &Path) -> Result<Box<dyn Board>, BoardError>;
}

/// Tries each candidate device in turn and returns the first board that
/// connects, or `None` if none do.
pub fn connect_first(
    connector: &dyn BoardConnector,
    candidates: &[PathBuf],
) -> Option<Box<dyn Board>> {
    for candidate in candidates {
        match connector.connect(candidate) {
            Ok(board) => {
                info!("Found board on {}", candidate.display());
                return Some(board);
            }
            Err(err) => debug!("No board on {}: {err}", candidate.display()),
        }
    }

    info!(
        "No board found after probing {} devices, running without sensors",
        candidates.len()
    );
    None
}

/// Serial device paths `{prefix}0` .. `{prefix}{count - 1}`.
pub fn serial_candidates(prefix: &str, count: u32) -> Vec<PathBuf> {
    (0..count)
        .map(|index| PathBuf::from(format!("{prefix}{index}")))
        .collect()
}

/// Enables every channel in `channels`, returning the ones the board refused.
pub fn enable_channels(board: &mut dyn Board, channels: &[Channel]) -> Vec<(Channel, BoardError)> {
    channels
        .iter()
        .filter_map(|channel| {
            board
                .enable_channel(*channel)
                .err()
                .map(|err| (*channel, err))
        })
        .collect()
}
