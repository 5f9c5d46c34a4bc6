use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crossbeam::channel;

use crate::{
    board::{connect_first, serial_candidates},
    firmata::{
        AnalogReading, FirmataBoard, FirmataMessage, FirmataParser, FirmwareVersion,
        configure_line, wait_for_firmware,
    },
};

use super::*;

fn feed(parser: &mut FirmataParser, bytes: &[u8]) -> Vec<AnalogReading> {
    bytes
        .iter()
        .filter_map(|byte| match parser.feed(*byte)? {
            FirmataMessage::Analog(reading) => Some(reading),
            FirmataMessage::Version(_) => None,
        })
        .collect()
}

#[test]
fn serial_candidates_are_numbered() {
    itertools::assert_equal(
        serial_candidates("/dev/ttyACM", 3),
        ["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyACM2"].map(PathBuf::from),
    );
}

#[test]
fn connect_first_stops_at_first_working_device() {
    let connector = FakeConnector {
        working: vec![PathBuf::from("/dev/ttyACM1"), PathBuf::from("/dev/ttyACM2")],
        ..Default::default()
    };

    let board = connect_first(&connector, &serial_candidates("/dev/ttyACM", 4));

    assert_eq!("fake", board.unwrap().name());
    itertools::assert_equal(
        connector.attempts.lock().unwrap().iter(),
        &[PathBuf::from("/dev/ttyACM0"), PathBuf::from("/dev/ttyACM1")],
    );
}

#[test]
fn connect_first_without_board() {
    let connector = FakeConnector::default();

    let board = connect_first(&connector, &serial_candidates("/dev/ttyACM", 40));

    assert!(board.is_none());
    assert_eq!(40, connector.attempts.lock().unwrap().len());
}

#[test]
fn firmata_board_fails_on_missing_device() {
    assert!(FirmataBoard::open(Path::new("/dev/no-such-board"), Duration::ZERO).is_err());
}

#[test]
fn line_setup_failure_is_reported_in_the_error() {
    let error = configure_line(Path::new("/dev/no-such-board")).unwrap_err();

    assert!(error.to_string().contains("/dev/no-such-board"), "{error}");
}

#[test]
fn firmata_reports_firmware_version() {
    let mut parser = FirmataParser::default();

    let messages: Vec<FirmataMessage> = [0xF9, 0x02, 0x05, 0xE0, 0x01, 0x00]
        .iter()
        .filter_map(|byte| parser.feed(*byte))
        .collect();

    assert_eq!(
        vec![
            FirmataMessage::Version(FirmwareVersion { major: 2, minor: 5 }),
            FirmataMessage::Analog(AnalogReading {
                pin: 0,
                value: 1.0 / 1023.0
            }),
        ],
        messages
    );
}

#[test]
fn setup_waits_for_the_booted_firmware() {
    let (sender, ready) = channel::bounded(1);

    let booting = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        sender
            .send(FirmwareVersion { major: 2, minor: 5 })
            .unwrap();
        sender
    });

    let start = Instant::now();
    let version = wait_for_firmware(&ready, Duration::from_secs(5)).unwrap();

    assert_eq!(Some(FirmwareVersion { major: 2, minor: 5 }), version);
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(start.elapsed() < Duration::from_secs(5));
    drop(booting.join().unwrap());
}

#[test]
fn setup_gives_up_on_silent_firmware() {
    let (sender, ready) = channel::bounded::<FirmwareVersion>(1);

    let start = Instant::now();
    assert_eq!(None, wait_for_firmware(&ready, Duration::from_millis(20)).unwrap());
    assert!(start.elapsed() >= Duration::from_millis(20));

    drop(sender);
    assert!(wait_for_firmware(&ready, Duration::from_millis(20)).is_err());
}

#[test]
fn firmata_decodes_analog_messages() {
    let mut parser = FirmataParser::default();

    let readings = feed(&mut parser, &[0xE1, 0x7F, 0x07, 0xE0, 0x00, 0x00]);

    assert_eq!(
        vec![
            AnalogReading {
                pin: 1,
                value: 1.0
            },
            AnalogReading {
                pin: 0,
                value: 0.0
            }
        ],
        readings
    );
}

#[test]
fn firmata_skips_other_traffic() {
    let mut parser = FirmataParser::default();

    let readings = feed(
        &mut parser,
        &[
            // protocol version
            0xF9, 0x02, 0x05, //
            // firmware name
            0xF0, 0x79, 0x02, 0x05, 0x41, 0x00, 0xF7, //
            // digital port 1
            0x91, 0x01, 0x00, //
            // stray data
            0x12, 0x34, //
            // analog pin 3 = 512
            0xE3, 0x00, 0x04,
        ],
    );

    assert_eq!(1, readings.len());
    assert_eq!(3, readings[0].pin);
    assert_eq!(512.0 / 1023.0, readings[0].value);
}

#[test]
fn firmata_restarts_on_interrupted_message() {
    let mut parser = FirmataParser::default();

    // Pin 2's message loses its MSB to a new status byte
    let readings = feed(&mut parser, &[0xE2, 0x10, 0xE4, 0x01, 0x00]);

    assert_eq!(
        vec![AnalogReading {
            pin: 4,
            value: 1.0 / 1023.0
        }],
        readings
    );
}

#[test]
fn fake_board_enables_analog_channels_only() {
    let mut board = FakeBoard::default();

    let refused = crate::board::enable_channels(&mut board, &[0, 1, 16]);

    assert_eq!(vec![0, 1], board.enabled());
    assert_eq!(1, refused.len());
    assert_eq!(16, refused[0].0);
}
