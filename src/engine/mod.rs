//! The aggregation engine: per-frame tracker pass, alarm materialisation
//! and the shared state that readers poll.

pub mod aggregator;
pub mod runner;
pub mod state;


pub use aggregator::{Aggregator, Observation};
pub use runner::{AggregationLoop, Detectors};
pub use state::{ActionOutcome, MonitorState, StatusReport};
