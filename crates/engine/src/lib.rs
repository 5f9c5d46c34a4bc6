pub mod ambient;
pub mod assets;
pub mod board;
pub mod breath;
pub mod control;
pub mod firmata;
pub mod playback;
pub mod shutdown;
pub mod speed;
pub mod stems;
