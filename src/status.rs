use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::alarms::{Alarm, AlarmStatus, AlarmType};
use crate::trackers::FireProgress;

/// How urgently the status wants attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Warning,
    Active,
    Critical,
}

impl Severity {
    /// Stylesheet class expected by the dashboard
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Normal => "status-normal",
            Self::Warning => "status-possible-fall",
            Self::Active => "status-alarm-active",
            Self::Critical => "status-alarm-critical",
        }
    }
}

/// Transient tracker state worth showing before any alarm exists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerDisplay {
    pub fall_candidate_for: Option<Duration>,
    pub fire: Option<FireProgress>,
    pub light_on: bool,
}

/// One-line summary for the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub text: String,
    pub severity: Severity,
}

impl Status {
    fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }

    pub fn starting() -> Self {
        Self::new("Starting...", Severity::Normal)
    }

    pub fn stopped() -> Self {
        Self::new("Processing stopped.", Severity::Normal)
    }

    pub fn source_unavailable() -> Self {
        Self::new("Error: could not open the video source.", Severity::Active)
    }
}

fn count_new(open_alarms: &[Alarm], alarm_type: &AlarmType) -> usize {
    open_alarms
        .iter()
        .filter(|alarm| alarm.status == AlarmStatus::New && &alarm.alarm_type == alarm_type)
        .count()
}

/// Pick the status to display. The first matching rule wins:
/// new unattended fire, new fall, new forgotten light, acknowledged alarms,
/// a fall in progress, a fire in progress, normal. New alarms of custom types
/// have no rule of their own and only show once acknowledged.
pub fn resolve(open_alarms: &[Alarm], display: &TrackerDisplay) -> Status {
    let fires = count_new(open_alarms, &AlarmType::UnattendedFire);
    if fires > 0 {
        return Status::new(format!("UNATTENDED FIRE ALARM ({})!", fires), Severity::Critical);
    }

    let falls = count_new(open_alarms, &AlarmType::Fall);
    if falls > 0 {
        return Status::new(format!("FALL ALARM ({})!", falls), Severity::Active);
    }

    let lights = count_new(open_alarms, &AlarmType::ForgottenLight);
    if lights > 0 {
        return Status::new(format!("FORGOTTEN LIGHT ALARM ({})!", lights), Severity::Active);
    }

    let mut acknowledged: Vec<(&AlarmType, usize)> = Vec::new();
    for alarm in open_alarms
        .iter()
        .filter(|alarm| alarm.status == AlarmStatus::Acknowledged)
    {
        match acknowledged.iter_mut().find(|(t, _)| *t == &alarm.alarm_type) {
            Some((_, count)) => *count += 1,
            None => acknowledged.push((&alarm.alarm_type, 1)),
        }
    }
    if !acknowledged.is_empty() {
        acknowledged.sort_by_key(|(alarm_type, _)| alarm_type.priority());
        let parts: Vec<String> = acknowledged
            .iter()
            .map(|(alarm_type, count)| format!("{} ({})", alarm_type.title(), count))
            .collect();
        return Status::new(
            format!("Acknowledged: {}. Pending resolution.", parts.join(", ")),
            Severity::Warning,
        );
    }

    if let Some(elapsed) = display.fall_candidate_for {
        return Status::new(
            format!("Possible fall detected ({:.1}s)", elapsed.as_secs_f64()),
            Severity::Warning,
        );
    }

    if let Some(fire) = display.fire {
        let person = if fire.person_present {
            "present".to_string()
        } else {
            format!("absent for {:.0}s", fire.since_last_person.as_secs_f64())
        };
        return Status::new(
            format!(
                "Fire detected ({:.0}s). Person: {}",
                fire.burning_for.as_secs_f64(),
                person
            ),
            Severity::Warning,
        );
    }

    if display.light_on {
        Status::new("Normal (light on)", Severity::Normal)
    } else {
        Status::new("Normal", Severity::Normal)
    }
}
