//! Analog input over the Firmata protocol.
//!
//! Firmata is MIDI-shaped: a status byte with the high bit set followed by
//! 7-bit data bytes. Only analog reports and the firmware version are
//! decoded, everything else is skipped.

use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind, Read, Write},
    path::Path,
    process::Command,
    sync::Arc,
    thread,
    time::Duration,
};

use activity::{AnalogSource, Channel};
use crossbeam::{
    atomic::AtomicCell,
    channel::{self, Receiver, RecvTimeoutError, Sender},
};
use tracing::{debug, info, warn};

use crate::board::{Board, BoardConnector, BoardError};

pub const ANALOG_PINS: usize = 16;
pub const BAUD_RATE: u32 = 57_600;
/// Opening the port resets the board; its bootloader runs for a few seconds
/// and drops anything written meanwhile.
pub const DEFAULT_SETUP_WAIT: Duration = Duration::from_secs(5);

const ANALOG_MESSAGE: u8 = 0xE0;
const DIGITAL_MESSAGE: u8 = 0x90;
const REPORT_ANALOG: u8 = 0xC0;
const REPORT_VERSION: u8 = 0xF9;
const START_SYSEX: u8 = 0xF0;
const END_SYSEX: u8 = 0xF7;

const ANALOG_MAX: f32 = 1023.0;

type AnalogPins = Arc<[AtomicCell<Option<f32>>; ANALOG_PINS]>;

/// A Firmata board on a serial device.
///
/// A background thread decodes the incoming byte stream and keeps the latest
/// value of every analog pin, so reads never block.
#[derive(Debug)]
pub struct FirmataBoard {
    name: String,
    port: File,
    pins: AnalogPins,
}

impl FirmataBoard {
    /// Opens `device` and waits up to `setup_wait` for the firmware to
    /// announce itself, so reporting requests written afterwards are not
    /// lost while the board boots.
    pub fn open(device: &Path, setup_wait: Duration) -> Result<Self, BoardError> {
        let open_error = |source| BoardError::Open {
            path: device.to_path_buf(),
            source,
        };

        configure_line(device).map_err(open_error)?;

        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(open_error)?;
        let reader = port.try_clone().map_err(open_error)?;

        let pins: AnalogPins = Arc::new(std::array::from_fn(|_| AtomicCell::new(None)));

        let (ready_sender, ready) = channel::bounded(1);
        let worker = FirmataReaderWorker {
            parser: FirmataParser::default(),
            pins: pins.clone(),
            ready: Some(ready_sender),
        };
        thread::Builder::new()
            .name("firmata-reader".to_owned())
            .spawn(move || worker.run(reader))
            .map_err(open_error)?;

        let name = device.display().to_string();
        match wait_for_firmware(&ready, setup_wait) {
            Ok(Some(version)) => info!("{name} runs Firmata {version}"),
            Ok(None) => warn!("{name} did not report a Firmata version within {setup_wait:?}"),
            Err(err) => return Err(open_error(err)),
        }

        Ok(Self { name, port, pins })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Waits for the reader to see the version report the firmware sends once it
/// has booted. `Ok(None)` if it stays silent for `timeout`.
pub(crate) fn wait_for_firmware(
    ready: &Receiver<FirmwareVersion>,
    timeout: Duration,
) -> io::Result<Option<FirmwareVersion>> {
    match ready.recv_timeout(timeout) {
        Ok(version) => Ok(Some(version)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "board stopped sending during setup",
        )),
    }
}

impl AnalogSource for FirmataBoard {
    fn read(&self, channel: Channel) -> Option<f32> {
        self.pins.get(channel as usize)?.load()
    }
}

impl Board for FirmataBoard {
    fn enable_channel(&mut self, channel: Channel) -> Result<(), BoardError> {
        if channel as usize >= ANALOG_PINS {
            return Err(BoardError::InvalidChannel(channel));
        }

        self.port.write_all(&[REPORT_ANALOG | channel, 1])?;
        self.port.flush()?;
        debug!("Enabled analog reporting on {} pin {channel}", self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FirmataConnector {
    pub setup_wait: Duration,
}

impl Default for FirmataConnector {
    fn default() -> Self {
        Self {
            setup_wait: DEFAULT_SETUP_WAIT,
        }
    }
}

impl BoardConnector for FirmataConnector {
    fn connect(&self, device: &Path) -> Result<Box<dyn Board>, BoardError> {
        Ok(Box::new(FirmataBoard::open(device, self.setup_wait)?))
    }
}

/// Puts the serial line into raw mode at the Firmata baud rate. Uses GNU
/// stty's `-F`; stty's complaints end up in the returned error.
pub(crate) fn configure_line(device: &Path) -> io::Result<()> {
    let output = Command::new("stty")
        .arg("-F")
        .arg(device)
        .arg(BAUD_RATE.to_string())
        .args(["raw", "-echo"])
        .output()
        .map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("running stty on {}: {err}", device.display()),
            )
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(io::Error::other(format!(
            "stty on {} exited with {}: {}",
            device.display(),
            output.status,
            stderr.trim()
        )))
    }
}

struct FirmataReaderWorker {
    parser: FirmataParser,
    pins: AnalogPins,
    ready: Option<Sender<FirmwareVersion>>,
}

impl FirmataReaderWorker {
    fn run(mut self, mut reader: File) {
        let mut buffer = [0u8; 256];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    warn!("Board closed the connection, analog values are frozen");
                    return;
                }
                Ok(len) => self.receive_bytes(&buffer[..len]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("Reading from board failed ({err}), analog values are frozen");
                    return;
                }
            }
        }
    }

    fn receive_bytes(&mut self, bytes: &[u8]) {
        for message in bytes.iter().filter_map(|byte| self.parser.feed(*byte)) {
            match message {
                FirmataMessage::Analog(reading) => {
                    self.pins[reading.pin as usize].store(Some(reading.value));
                }
                FirmataMessage::Version(version) => {
                    // Only the first report matters; the board may repeat it
                    if let Some(ready) = self.ready.take() {
                        let _ = ready.send(version);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AnalogReading {
    pub pin: Channel,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FirmataMessage {
    Analog(AnalogReading),
    Version(FirmwareVersion),
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum ParseState {
    #[default]
    Idle,
    Analog {
        pin: Channel,
        lsb: Option<u8>,
    },
    Version {
        major: Option<u8>,
    },
    Skip(usize),
    SysEx,
}

#[derive(Debug, Default)]
pub(crate) struct FirmataParser {
    state: ParseState,
}

impl FirmataParser {
    pub fn feed(&mut self, byte: u8) -> Option<FirmataMessage> {
        if byte & 0x80 != 0 {
            self.state = match byte {
                START_SYSEX => ParseState::SysEx,
                END_SYSEX => ParseState::Idle,
                _ if byte & 0xF0 == ANALOG_MESSAGE => ParseState::Analog {
                    pin: byte & 0x0F,
                    lsb: None,
                },
                _ if byte & 0xF0 == DIGITAL_MESSAGE => ParseState::Skip(2),
                REPORT_VERSION => ParseState::Version { major: None },
                _ => ParseState::Idle,
            };
            return None;
        }

        match self.state {
            ParseState::Idle | ParseState::SysEx => None,
            ParseState::Skip(remaining) => {
                self.state = if remaining > 1 {
                    ParseState::Skip(remaining - 1)
                } else {
                    ParseState::Idle
                };
                None
            }
            ParseState::Version { major: None } => {
                self.state = ParseState::Version { major: Some(byte) };
                None
            }
            ParseState::Version { major: Some(major) } => {
                self.state = ParseState::Idle;
                Some(FirmataMessage::Version(FirmwareVersion {
                    major,
                    minor: byte,
                }))
            }
            ParseState::Analog { pin, lsb: None } => {
                self.state = ParseState::Analog {
                    pin,
                    lsb: Some(byte),
                };
                None
            }
            ParseState::Analog {
                pin,
                lsb: Some(lsb),
            } => {
                self.state = ParseState::Idle;
                let raw = u16::from(lsb) | (u16::from(byte) << 7);
                Some(FirmataMessage::Analog(AnalogReading {
                    pin,
                    value: f32::from(raw) / ANALOG_MAX,
                }))
            }
        }
    }
}
