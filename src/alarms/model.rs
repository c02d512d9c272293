use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ActionError;

/// Kinds of safety event the engine raises
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AlarmType {
    Fall,
    UnattendedFire,
    ForgottenLight,
    Custom(String),
}

impl AlarmType {
    /// Display priority; lower sorts first
    pub fn priority(&self) -> u8 {
        match self {
            Self::UnattendedFire => 0,
            Self::Fall => 1,
            Self::ForgottenLight => 2,
            Self::Custom(_) => 3,
        }
    }

    /// Human-facing name
    pub fn title(&self) -> &str {
        match self {
            Self::Fall => "Fall",
            Self::UnattendedFire => "Unattended fire",
            Self::ForgottenLight => "Forgotten light",
            Self::Custom(name) => name,
        }
    }
}

impl Display for AlarmType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fall => write!(f, "fall"),
            Self::UnattendedFire => write!(f, "unattended_fire"),
            Self::ForgottenLight => write!(f, "forgotten_light"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl From<String> for AlarmType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "fall" => Self::Fall,
            "unattended_fire" => Self::UnattendedFire,
            "forgotten_light" => Self::ForgottenLight,
            _ => Self::Custom(value),
        }
    }
}

impl From<AlarmType> for String {
    fn from(value: AlarmType) -> Self {
        value.to_string()
    }
}

/// Lifecycle status of an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmStatus {
    New,
    Acknowledged,
    Resolved,
    FalsePositive,
}

impl AlarmStatus {
    /// Resolved and false-positive alarms never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::FalsePositive)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Acknowledged => 1,
            Self::Resolved => 2,
            Self::FalsePositive => 3,
        }
    }
}

impl Display for AlarmStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Resolved => write!(f, "resolved"),
            Self::FalsePositive => write!(f, "false_positive"),
        }
    }
}

/// Operator actions on an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmAction {
    Acknowledge,
    Resolve,
    FalsePositive,
}

impl AlarmAction {
    /// Status reached by applying this action, if the transition is allowed
    pub fn apply_to(&self, status: AlarmStatus) -> Option<AlarmStatus> {
        match (self, status) {
            (Self::Acknowledge, AlarmStatus::New) => Some(AlarmStatus::Acknowledged),
            (Self::Resolve, AlarmStatus::Acknowledged) => Some(AlarmStatus::Resolved),
            (Self::FalsePositive, AlarmStatus::New | AlarmStatus::Acknowledged) => {
                Some(AlarmStatus::FalsePositive)
            }
            _ => None,
        }
    }

    /// Past tense used in operator messages
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Acknowledge => "acknowledged",
            Self::Resolve => "resolved",
            Self::FalsePositive => "marked as a false positive",
        }
    }
}

impl Display for AlarmAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acknowledge => write!(f, "acknowledge"),
            Self::Resolve => write!(f, "resolve"),
            Self::FalsePositive => write!(f, "false_positive"),
        }
    }
}

impl FromStr for AlarmAction {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acknowledge" => Ok(Self::Acknowledge),
            "resolve" => Ok(Self::Resolve),
            "false_positive" => Ok(Self::FalsePositive),
            other => Err(ActionError::UnknownAction(other.to_string())),
        }
    }
}

/// A detected safety event awaiting operator attention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alarm_type: AlarmType,
    pub status: AlarmStatus,
    pub detected_at: DateTime<Utc>,
    pub last_status_change: DateTime<Utc>,
    /// Handle to a stored image of the scene, when one was captured
    pub snapshot_reference: Option<String>,
}

impl Alarm {
    pub fn new(alarm_type: AlarmType, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alarm_type,
            status: AlarmStatus::New,
            detected_at,
            last_status_change: detected_at,
            snapshot_reference: None,
        }
    }

    /// First eight characters of the id, for log lines and operator messages
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }

    /// Ordering key used by registry snapshots
    pub(crate) fn display_key(&self) -> (u8, u8, DateTime<Utc>) {
        (self.status.rank(), self.alarm_type.priority(), self.detected_at)
    }
}
