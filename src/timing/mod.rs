pub mod planner;

pub use planner::{SlideTiming, TimingMode};
