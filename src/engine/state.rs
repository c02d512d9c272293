use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::alarms::{Alarm, AlarmAction, AlarmRegistry, AlarmType, Cooldowns};
use crate::clock::{Clock, Tick};
use crate::detection::Modality;
use crate::error::ActionError;
use crate::status::{self, Severity, Status, TrackerDisplay};

/// What the delivery layer shows: the latest status plus open alarms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub text: String,
    pub severity: Severity,
    pub severity_class: String,
    pub alarms: Vec<Alarm>,
    /// Modalities whose detector is missing or failing
    pub degraded: Vec<Modality>,
    /// Wall time of the frame the status was computed from
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of an operator action, shaped for the delivery layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

struct Inner {
    registry: AlarmRegistry,
    status: Status,
    display: TrackerDisplay,
    degraded: BTreeSet<Modality>,
    updated_at: Option<DateTime<Utc>>,
    running: bool,
}

/// Everything shared between the aggregation loop and its readers.
///
/// One lock guards the registry and the published status together, so a
/// reader sees either all of a frame's updates or none of them.
pub struct MonitorState {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl MonitorState {
    pub fn new(cooldowns: Cooldowns, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                registry: AlarmRegistry::new(cooldowns),
                status: Status::starting(),
                display: TrackerDisplay::default(),
                degraded: BTreeSet::new(),
                updated_at: None,
                running: false,
            }),
            clock,
        }
    }

    /// Read the latest published snapshot
    pub async fn get_status(&self) -> StatusReport {
        let inner = self.inner.lock().await;
        StatusReport {
            text: inner.status.text.clone(),
            severity: inner.status.severity,
            severity_class: inner.status.severity.css_class().to_string(),
            alarms: inner.registry.snapshot(),
            degraded: inner.degraded.iter().copied().collect(),
            updated_at: inner.updated_at,
        }
    }

    /// Apply an operator action, refreshing the status on success
    pub async fn try_apply_alarm_action(
        &self,
        id: Uuid,
        action: AlarmAction,
    ) -> Result<Alarm, ActionError> {
        let at = self.clock.now().wall;
        let mut inner = self.inner.lock().await;
        let alarm = inner.registry.apply_action(id, action, at)?;
        if inner.running {
            let open = inner.registry.snapshot();
            let refreshed = status::resolve(&open, &inner.display);
            inner.status = refreshed;
        }
        Ok(alarm)
    }

    pub async fn apply_alarm_action(&self, id: Uuid, action: AlarmAction) -> ActionOutcome {
        match self.try_apply_alarm_action(id, action).await {
            Ok(alarm) => ActionOutcome {
                success: true,
                message: format!(
                    "Alarm {} ({}) {}.",
                    alarm.short_id(),
                    alarm.alarm_type.title(),
                    action.past_tense()
                ),
            },
            Err(err) => ActionOutcome {
                success: false,
                message: self.describe_failure(id, &err).await,
            },
        }
    }

    /// Same as [`apply_alarm_action`](Self::apply_alarm_action) with
    /// unparsed inputs, as they arrive from a request path
    pub async fn apply_alarm_action_raw(&self, id: &str, action: &str) -> ActionOutcome {
        let action = match action.parse::<AlarmAction>() {
            Ok(action) => action,
            Err(err) => {
                return ActionOutcome {
                    success: false,
                    message: format!("Cannot process request: {}.", err),
                }
            }
        };

        match Uuid::parse_str(id) {
            Ok(id) => self.apply_alarm_action(id, action).await,
            Err(_) => ActionOutcome {
                success: false,
                message: format!("Alarm with id {} not found.", id),
            },
        }
    }

    async fn describe_failure(&self, id: Uuid, err: &ActionError) -> String {
        match err {
            ActionError::NotFound(_) => format!("Alarm with id {} not found.", id),
            ActionError::InvalidTransition { .. } => {
                let inner = self.inner.lock().await;
                match inner.registry.get(&id) {
                    Some(alarm) => format!(
                        "Alarm {} ({}): {}.",
                        alarm.short_id(),
                        alarm.alarm_type.title(),
                        err
                    ),
                    None => format!("{}.", err),
                }
            }
            ActionError::UnknownAction(_) => format!("Cannot process request: {}.", err),
        }
    }

    /// Materialise a frame's triggers and publish the resulting status in one
    /// critical section. Returns the alarms actually created.
    pub(crate) async fn publish_frame(
        &self,
        triggers: Vec<AlarmType>,
        display: TrackerDisplay,
        degraded: BTreeSet<Modality>,
        now: &Tick,
    ) -> Vec<Alarm> {
        let mut inner = self.inner.lock().await;
        let created: Vec<Alarm> = triggers
            .into_iter()
            .filter_map(|trigger| inner.registry.try_create(trigger, now))
            .collect();

        let open = inner.registry.snapshot();
        inner.status = status::resolve(&open, &display);
        inner.display = display;
        inner.degraded = degraded;
        inner.updated_at = Some(now.wall);
        inner.running = true;

        created
    }

    pub(crate) async fn publish_stopped(&self) {
        let mut inner = self.inner.lock().await;
        inner.status = Status::stopped();
        inner.display = TrackerDisplay::default();
        inner.degraded.clear();
        inner.running = false;
    }

    pub(crate) async fn publish_source_unavailable(&self) {
        let mut inner = self.inner.lock().await;
        inner.status = Status::source_unavailable();
        inner.running = false;
    }
}
