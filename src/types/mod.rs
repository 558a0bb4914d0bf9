//! Shared data structures for the sampling-to-alarm pipeline
//!
//! - `Threshold` / `ThresholdHandle`: the selectable alarm threshold and the
//!   shared cell the presentation layer writes through
//! - `TickOutput`: what one tick of the alarm monitor produces
//! - `LevelReport`: the snapshot published to the presentation layer

mod level;
mod threshold;

pub use level::*;
pub use threshold::*;
