use log::debug;
use std::time::Duration;

use crate::alarms::AlarmType;
use crate::config::{secs, FireConfig};
use crate::error::Error;

/// Display state for a fire that has not yet raised an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireProgress {
    pub burning_for: Duration,
    pub person_present: bool,
    pub since_last_person: Duration,
}

/// Raises `unattended_fire` when a fire keeps burning in an empty room
#[derive(Debug, Clone)]
pub struct FireTracker {
    unattended: Duration,
    fire_since: Option<Duration>,
    alerted_this_episode: bool,
}

impl FireTracker {
    pub fn new(unattended: Duration) -> Self {
        Self {
            unattended,
            fire_since: None,
            alerted_this_episode: false,
        }
    }

    pub fn from_config(config: &FireConfig) -> Result<Self, Error> {
        Ok(Self::new(secs("fire.unattended_secs", config.unattended_secs)?))
    }

    /// Feed one frame.
    ///
    /// `last_person_seen_at` must already include this frame's person pass.
    pub fn update(
        &mut self,
        fire_present: bool,
        person_present: bool,
        last_person_seen_at: Duration,
        now: Duration,
    ) -> Option<AlarmType> {
        if !fire_present {
            if self.fire_since.take().is_some() {
                debug!("Fire no longer detected, episode closed");
            }
            self.alerted_this_episode = false;
            return None;
        }

        let since = match self.fire_since {
            Some(since) => since,
            None => {
                debug!("Fire detected, person present: {}", person_present);
                self.fire_since = Some(now);
                self.alerted_this_episode = false;
                now
            }
        };

        if person_present {
            // someone is tending it; re-arm for when they leave
            self.alerted_this_episode = false;
            return None;
        }

        let burning_for = now.saturating_sub(since);
        let since_last_person = now.saturating_sub(last_person_seen_at);
        if burning_for >= self.unattended
            && since_last_person >= self.unattended
            && !self.alerted_this_episode
        {
            debug!(
                "Unattended fire: burning {:.1}s, no person for {:.1}s",
                burning_for.as_secs_f64(),
                since_last_person.as_secs_f64()
            );
            self.alerted_this_episode = true;
            return Some(AlarmType::UnattendedFire);
        }

        None
    }

    pub fn is_burning(&self) -> bool {
        self.fire_since.is_some()
    }

    /// Progress of the current episode, if a fire is being tracked
    pub fn progress(
        &self,
        person_present: bool,
        last_person_seen_at: Duration,
        now: Duration,
    ) -> Option<FireProgress> {
        self.fire_since.map(|since| FireProgress {
            burning_for: now.saturating_sub(since),
            person_present,
            since_last_person: now.saturating_sub(last_person_seen_at),
        })
    }
}
