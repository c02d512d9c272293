pub mod alarms;
pub mod api;
pub mod capture;
pub mod clock;
pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod replay;
pub mod status;
pub mod trackers;

// Re-export main components for easier use
pub use alarms::{Alarm, AlarmAction, AlarmRegistry, AlarmStatus, AlarmType, Cooldowns};
pub use clock::{Clock, ManualClock, SystemClock, Tick};
pub use engine::{AggregationLoop, Detectors, MonitorState, Observation, StatusReport};
pub use error::{ActionError, Error};
pub use status::{Severity, Status};
