pub mod model;
pub mod registry;

pub use model::{Alarm, AlarmAction, AlarmStatus, AlarmType};
pub use registry::{AlarmRegistry, Cooldowns};
