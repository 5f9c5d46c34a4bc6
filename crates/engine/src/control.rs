use std::{
    io,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use activity::{
    ActivityCounter, Channel, FeltSensor, IrSensor, IrTrigger, Sampler, SpeedMapper,
};
use derivative::Derivative;
use tracing::{debug, info, warn};

use crate::{
    board::{Board, enable_channels},
    shutdown::ShutdownSignal,
    speed::SpeedSender,
    stems::StemTrigger,
};

#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub tick: Duration,
    pub sampler: Sampler,
    pub ir_channels: Vec<Channel>,
    pub ir_trigger: IrTrigger,
    pub felt_channels: Vec<Channel>,
    pub felt_threshold: f32,
    pub mapper: SpeedMapper,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub value: u32,
    pub speed: f32,
    pub deltas: Vec<(Channel, f32)>,
    pub grown: u32,
    pub decayed: bool,
    pub touched: Vec<Channel>,
    pub skipped: Vec<Channel>,
}

/// Turns sensor readings into breathing speed and stem triggers.
///
/// Owns all sensor and activity state; the only thing leaving this loop is
/// the speed published every tick and the stems it fires.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ControlLoop {
    #[derivative(Debug = "ignore")]
    board: Option<Box<dyn Board>>,
    sampler: Sampler,
    ir_sensors: Vec<IrSensor>,
    ir_trigger: IrTrigger,
    felt_sensors: Vec<FeltSensor>,
    counter: ActivityCounter,
    mapper: SpeedMapper,
    speed: SpeedSender,
    stems: StemTrigger,
    tick: Duration,
}

impl ControlLoop {
    pub fn new(
        settings: ControlSettings,
        mut board: Option<Box<dyn Board>>,
        counter: ActivityCounter,
        speed: SpeedSender,
        stems: StemTrigger,
    ) -> Self {
        if let Some(board) = board.as_deref_mut() {
            let channels: Vec<Channel> = settings
                .ir_channels
                .iter()
                .chain(&settings.felt_channels)
                .copied()
                .collect();

            for (channel, err) in enable_channels(board, &channels) {
                warn!("Could not enable channel {channel} on {}: {err}", board.name());
            }
        }

        Self {
            board,
            sampler: settings.sampler,
            ir_sensors: settings.ir_channels.into_iter().map(IrSensor::new).collect(),
            ir_trigger: settings.ir_trigger,
            felt_sensors: settings
                .felt_channels
                .into_iter()
                .map(|channel| FeltSensor::new(channel, settings.felt_threshold))
                .collect(),
            counter,
            mapper: settings.mapper,
            speed,
            stems,
            tick: settings.tick,
        }
    }

    pub fn has_board(&self) -> bool {
        self.board.is_some()
    }

    pub fn counter(&self) -> &ActivityCounter {
        &self.counter
    }

    pub fn stems(&self) -> &StemTrigger {
        &self.stems
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        if let Some(board) = self.board.as_deref() {
            for ir in &mut self.ir_sensors {
                match self.sampler.sample(board, ir.channel()) {
                    Ok(sample) => {
                        let delta = ir.update(sample);
                        report.deltas.push((ir.channel(), delta));

                        let units = self.ir_trigger.units(delta);
                        if units > 0 {
                            report.grown += self.counter.add(units, now);
                        }
                    }
                    Err(err) => {
                        warn!("Skipping IR sensor this tick: {err}");
                        report.skipped.push(ir.channel());
                    }
                }
            }
        }

        report.decayed = self.counter.tick(now);
        report.value = self.counter.value();
        report.speed = self.mapper.speed_for(&self.counter);
        self.speed.publish(report.speed);

        if let Some(board) = self.board.as_deref() {
            for felt in &mut self.felt_sensors {
                match self.sampler.sample(board, felt.channel()) {
                    Ok(sample) => {
                        if felt.update(sample) {
                            report.touched.push(felt.channel());
                            self.stems.fire();
                        }
                    }
                    Err(err) => {
                        warn!("Skipping felt sensor this tick: {err}");
                        report.skipped.push(felt.channel());
                    }
                }
            }
        }

        self.stems.reap();

        report
    }

    pub fn run(mut self, shutdown: ShutdownSignal) {
        info!(
            "Control loop started, ticking every {:?}{}",
            self.tick,
            if self.has_board() { "" } else { " without a board" }
        );

        loop {
            let started = Instant::now();
            let report = self.tick(started);
            debug!(
                "Counter: {} Speed: {:.3} Deltas: {:?}",
                report.value, report.speed, report.deltas
            );

            // Overruns are not caught up on, the next tick just starts late
            let remaining = self.tick.saturating_sub(started.elapsed());
            if shutdown.wait_timeout(remaining) {
                break;
            }
        }

        info!("Control loop stopped");
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("control".to_owned())
            .spawn(move || self.run(shutdown))
    }
}
