mod counter;
mod edge;
mod ir;
mod sampler;
mod speed;

pub use counter::ActivityCounter;
pub use edge::{EdgeDetector, FeltSensor};
pub use ir::{GrowthPolicy, IrSensor, IrTrigger};
pub use sampler::{AnalogSource, SampleError, Sampler, median};
pub use speed::SpeedMapper;

/// Identifies an analog input pin on the board.
pub type Channel = u8;

#[cfg(test)]
mod tests;
