use thiserror::Error;
use uuid::Uuid;

use crate::alarms::{AlarmAction, AlarmStatus};

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Reasons an alarm action can be refused. None of them mutate the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("alarm {0} not found")]
    NotFound(Uuid),

    #[error("cannot apply '{action}' to an alarm in status '{status}'")]
    InvalidTransition {
        status: AlarmStatus,
        action: AlarmAction,
    },

    #[error("unknown alarm action '{0}'")]
    UnknownAction(String),
}
