use std::{
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{Context, anyhow};
use clap::Parser;
use engine::{
    ambient::LoopPlayer,
    assets::Sounds,
    board::{connect_first, serial_candidates},
    breath::{BreathCycle, BreathPlayer},
    control::ControlLoop,
    firmata::FirmataConnector,
    playback::{Player, SoxPlayer},
    shutdown::shutdown,
    speed::speed_channel,
    stems::StemTrigger,
};
use itertools::Itertools;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

mod config;

#[derive(Parser, Debug)]
#[command(name = "breather", version)]
#[command(about = "Breathing sound installation driven by IR and felt sensors", long_about = None)]
struct Args {
    /// JSON configuration file; built-in defaults are used without one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the sounds, overrides the configuration
    #[arg(short, long)]
    sound_root: Option<PathBuf>,

    /// Do not probe for a board, breathe at rest speed
    #[arg(long, default_value_t = false)]
    no_board: bool,

    /// Shut down in an orderly way after this many seconds
    #[arg(long, value_name = "SECS")]
    run_for: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(root) = args.sound_root {
        config.sounds.root = Some(root);
    }
    if args.no_board {
        config.board.enabled = false;
    }
    config.validate().context("invalid configuration")?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let sounds = Sounds::discover(&config.sound_root()?, &config.sounds.layout);

    let board = if config.board.enabled {
        connect_first(
            &FirmataConnector {
                setup_wait: Duration::from_millis(config.board.setup_wait_ms),
            },
            &serial_candidates(&config.board.device_prefix, config.board.device_count),
        )
    } else {
        info!("Board disabled, breathing at rest speed");
        None
    };
    if board.is_some() {
        info!(
            "IR sensors on analog {}, felt sensors on analog {}",
            config.sensors.ir_channels.iter().join(", "),
            config.sensors.felt_channels.iter().join(", ")
        );
    }

    let player: Arc<dyn Player> = Arc::new(SoxPlayer::new(config.player.program.clone()));
    let (speed_sender, speed_receiver) = speed_channel();
    let (trigger, signal) = shutdown();

    let mut handles: Vec<(&str, JoinHandle<()>)> = Vec::new();

    let breather = BreathPlayer::new(
        player.clone(),
        BreathCycle::new(sounds.inhale, sounds.exhale),
        speed_receiver,
        config.breath.volume,
        Duration::from_millis(config.breath.retry_delay_ms),
    );
    handles.push((
        "breath",
        breather
            .spawn(signal.clone())
            .context("starting breath thread")?,
    ));

    match sounds.ambient {
        Some(ambient) if config.ambient.enabled => {
            let looper = LoopPlayer::new(
                player.clone(),
                ambient,
                config.ambient.volume,
                Duration::from_millis(config.ambient.pause_ms),
                Duration::from_millis(config.ambient.retry_delay_ms),
            );
            handles.push((
                "ambient",
                looper
                    .spawn(signal.clone())
                    .context("starting ambient thread")?,
            ));
        }
        Some(_) => info!("Ambient loop disabled"),
        None => info!("No ambient loop found, not starting the ambient player"),
    }

    let stems = StemTrigger::new(player, sounds.stems, config.stems.volume);
    let control = ControlLoop::new(
        config.control_settings(),
        board,
        config.counter(Instant::now()),
        speed_sender,
        stems,
    );
    handles.push((
        "control",
        control.spawn(signal).context("starting control thread")?,
    ));

    // Dropping the trigger also shuts everything down, keep it until joined.
    let _trigger = match args.run_for {
        Some(secs) => {
            thread::sleep(Duration::from_secs(secs));
            info!("Ran for {secs}s, shutting down");
            trigger.trigger();
            None
        }
        None => Some(trigger),
    };

    for (name, handle) in handles {
        handle
            .join()
            .map_err(|_| anyhow!("{name} thread panicked"))?;
    }

    info!("Stopped");
    Ok(())
}
