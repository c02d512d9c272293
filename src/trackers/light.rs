use log::debug;
use std::time::Duration;

use crate::alarms::AlarmType;
use crate::config::{secs, LightConfig};
use crate::error::Error;

/// Local hours during which the light is watched, `start` inclusive and
/// `end` exclusive. A window with `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveHours {
    pub start: u32,
    pub end: u32,
}

impl ActiveHours {
    pub const ALL_DAY: ActiveHours = ActiveHours { start: 0, end: 24 };

    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            self.start <= hour && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

/// Brightness thresholds with a dead band between them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    pub on_above: f64,
    pub off_below: f64,
}

/// Raises `forgotten_light` when the room stays lit for too long
#[derive(Debug, Clone)]
pub struct LightTracker {
    thresholds: Hysteresis,
    forgotten_after: Duration,
    check_interval: Duration,
    active_hours: ActiveHours,
    is_on: bool,
    on_since: Option<Duration>,
    last_check: Option<Duration>,
}

impl LightTracker {
    pub fn new(
        thresholds: Hysteresis,
        forgotten_after: Duration,
        check_interval: Duration,
        active_hours: ActiveHours,
    ) -> Self {
        Self {
            thresholds,
            forgotten_after,
            check_interval,
            active_hours,
            is_on: false,
            on_since: None,
            last_check: None,
        }
    }

    pub fn from_config(config: &LightConfig) -> Result<Self, Error> {
        Ok(Self::new(
            Hysteresis {
                on_above: config.on_threshold,
                off_below: config.off_threshold,
            },
            secs("light.forgotten_secs", config.forgotten_secs)?,
            secs("light.check_interval_secs", config.check_interval_secs)?,
            ActiveHours {
                start: config.active_hours_start,
                end: config.active_hours_end,
            },
        ))
    }

    /// Feed one brightness sample. Samples arriving sooner than the check
    /// interval after the previous check are ignored.
    pub fn update(&mut self, brightness: f64, hour: u32, now: Duration) -> Option<AlarmType> {
        if let Some(last) = self.last_check {
            if now.saturating_sub(last) < self.check_interval {
                return None;
            }
        }
        self.last_check = Some(now);

        if !self.active_hours.contains(hour) {
            self.is_on = false;
            self.on_since = None;
            return None;
        }

        if !self.is_on && brightness > self.thresholds.on_above {
            debug!("Light switched on (brightness {:.1})", brightness);
            self.is_on = true;
        } else if self.is_on && brightness < self.thresholds.off_below {
            debug!("Light switched off (brightness {:.1})", brightness);
            self.is_on = false;
            self.on_since = None;
        }

        if !self.is_on {
            return None;
        }

        let since = *self.on_since.get_or_insert(now);
        if now.saturating_sub(since) >= self.forgotten_after {
            self.on_since = None;
            return Some(AlarmType::ForgottenLight);
        }

        None
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }
}
