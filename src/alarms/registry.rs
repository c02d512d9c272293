use chrono::{DateTime, Utc};
use log::info;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use super::model::{Alarm, AlarmAction, AlarmType};
use crate::clock::Tick;
use crate::config::{secs, AlarmConfig};
use crate::error::{ActionError, Error};

/// Minimum spacing between two alarms of the same type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cooldowns {
    pub fall: Duration,
    pub unattended_fire: Duration,
    pub forgotten_light: Duration,
    /// Applied to custom alarm types
    pub default: Duration,
}

impl Cooldowns {
    pub fn from_config(config: &AlarmConfig) -> Result<Self, Error> {
        Ok(Self {
            fall: secs("alarms.fall_cooldown_secs", config.fall_cooldown_secs)?,
            unattended_fire: secs(
                "alarms.unattended_fire_cooldown_secs",
                config.unattended_fire_cooldown_secs,
            )?,
            forgotten_light: secs(
                "alarms.forgotten_light_cooldown_secs",
                config.forgotten_light_cooldown_secs,
            )?,
            default: secs("alarms.default_cooldown_secs", config.default_cooldown_secs)?,
        })
    }

    pub fn for_type(&self, alarm_type: &AlarmType) -> Duration {
        match alarm_type {
            AlarmType::Fall => self.fall,
            AlarmType::UnattendedFire => self.unattended_fire,
            AlarmType::ForgottenLight => self.forgotten_light,
            AlarmType::Custom(_) => self.default,
        }
    }
}

impl Default for Cooldowns {
    fn default() -> Self {
        Self {
            fall: Duration::from_secs(30),
            unattended_fire: Duration::from_secs(20),
            forgotten_light: Duration::from_secs(10),
            default: Duration::from_secs(30),
        }
    }
}

/// Owns every alarm raised since startup.
///
/// Not synchronised by itself; callers hold it behind the monitor lock so
/// creation and operator actions are serialised.
#[derive(Debug)]
pub struct AlarmRegistry {
    cooldowns: Cooldowns,
    alarms: Vec<Alarm>,
    last_created: HashMap<AlarmType, Duration>,
}

impl AlarmRegistry {
    pub fn new(cooldowns: Cooldowns) -> Self {
        Self {
            cooldowns,
            alarms: Vec::new(),
            last_created: HashMap::new(),
        }
    }

    /// Materialise a trigger into an alarm unless the type is cooling down.
    ///
    /// Spacing is measured on `now.mono`. `detected_at` comes from the wall
    /// clock, so if the wall clock steps backwards two alarms of one type can
    /// carry `detected_at` values closer together than the cooldown.
    pub fn try_create(&mut self, alarm_type: AlarmType, now: &Tick) -> Option<Alarm> {
        let cooldown = self.cooldowns.for_type(&alarm_type);
        if let Some(last) = self.last_created.get(&alarm_type) {
            if now.mono.saturating_sub(*last) < cooldown {
                return None;
            }
        }

        let alarm = Alarm::new(alarm_type.clone(), now.wall);
        self.last_created.insert(alarm_type, now.mono);
        self.alarms.push(alarm.clone());

        info!(
            "New alarm raised: id={}, type={}, at={}",
            alarm.id,
            alarm.alarm_type,
            alarm.detected_at.format("%Y-%m-%d %H:%M:%S")
        );

        Some(alarm)
    }

    /// Move an alarm through its lifecycle
    pub fn apply_action(
        &mut self,
        id: Uuid,
        action: AlarmAction,
        at: DateTime<Utc>,
    ) -> Result<Alarm, ActionError> {
        let alarm = self
            .alarms
            .iter_mut()
            .find(|alarm| alarm.id == id)
            .ok_or(ActionError::NotFound(id))?;

        let next = action
            .apply_to(alarm.status)
            .ok_or(ActionError::InvalidTransition {
                status: alarm.status,
                action,
            })?;

        alarm.status = next;
        alarm.last_status_change = at;

        info!(
            "Alarm {} ({}) {}",
            alarm.short_id(),
            alarm.alarm_type,
            action.past_tense()
        );

        Ok(alarm.clone())
    }

    /// Open alarms in display order: new before acknowledged, then type
    /// priority, then oldest first
    pub fn snapshot(&self) -> Vec<Alarm> {
        let mut open: Vec<Alarm> = self
            .alarms
            .iter()
            .filter(|alarm| !alarm.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by_key(Alarm::display_key);
        open
    }

    pub fn get(&self, id: &Uuid) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| &alarm.id == id)
    }

    /// Every alarm ever raised, terminal ones included, in creation order
    pub fn all(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}
