//! Per-condition temporal trackers.
//!
//! Each tracker consumes one frame's worth of signals and returns the alarm
//! type it wants raised, at most once per call. Trackers never talk to the
//! registry themselves; cooldowns are applied when triggers are materialised.

pub mod fall;
pub mod fire;
pub mod light;

pub use fall::FallTracker;
pub use fire::{FireProgress, FireTracker};
pub use light::{ActiveHours, Hysteresis, LightTracker};
