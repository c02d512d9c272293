use log::{info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::state::MonitorState;
use crate::alarms::{Alarm, AlarmType};
use crate::clock::Tick;
use crate::config::Config;
use crate::detection::{BoundingBox, Modality};
use crate::error::Error;
use crate::status::TrackerDisplay;
use crate::trackers::{FallTracker, FireTracker, LightTracker};

/// Signals extracted from one frame. `None` marks a modality whose detector
/// is unavailable or failed on this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub persons: Option<Vec<BoundingBox>>,
    pub fire: Option<bool>,
    pub brightness: Option<f64>,
}

impl Observation {
    pub fn degraded(&self) -> BTreeSet<Modality> {
        let mut degraded = BTreeSet::new();
        if self.persons.is_none() {
            degraded.insert(Modality::Person);
        }
        if self.fire.is_none() {
            degraded.insert(Modality::Fire);
        }
        if self.brightness.is_none() {
            degraded.insert(Modality::Light);
        }
        degraded
    }
}

/// Runs the trackers over each observation and hands their triggers to the
/// shared monitor state
pub struct Aggregator {
    fall: FallTracker,
    fire: FireTracker,
    light: LightTracker,
    last_person_seen_at: Duration,
    degraded: BTreeSet<Modality>,
    state: Arc<MonitorState>,
}

impl Aggregator {
    /// `started_at` seeds the last-person timestamp, so an empty room only
    /// counts as empty from the moment monitoring began
    pub fn new(config: &Config, state: Arc<MonitorState>, started_at: Duration) -> Result<Self, Error> {
        Ok(Self {
            fall: FallTracker::from_config(&config.fall)?,
            fire: FireTracker::from_config(&config.fire)?,
            light: LightTracker::from_config(&config.light)?,
            last_person_seen_at: started_at,
            degraded: BTreeSet::new(),
            state,
        })
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    /// Process one frame end to end and return the alarms it created
    pub async fn ingest(&mut self, observation: &Observation, now: &Tick) -> Vec<Alarm> {
        self.note_degraded(observation.degraded());
        let (triggers, display) = self.step(observation, now);
        self.state
            .publish_frame(triggers, display, self.degraded.clone(), now)
            .await
    }

    /// Tracker pass for one frame. Person bookkeeping and the fall tracker
    /// run before the fire tracker, which reads the last-person timestamp.
    /// A modality the detectors could not deliver skips its tracker, so a
    /// transient failure neither advances nor discards an episode.
    fn step(&mut self, observation: &Observation, now: &Tick) -> (Vec<AlarmType>, TrackerDisplay) {
        let person_present = observation
            .persons
            .as_ref()
            .map_or(false, |persons| !persons.is_empty());
        if person_present {
            self.last_person_seen_at = now.mono;
        }

        let mut triggers = Vec::new();

        if let Some(persons) = &observation.persons {
            triggers.extend(self.fall.update(persons, now.mono));
        }

        if let Some(fire_present) = observation.fire {
            triggers.extend(self.fire.update(
                fire_present,
                person_present,
                self.last_person_seen_at,
                now.mono,
            ));
        }

        if let Some(brightness) = observation.brightness {
            triggers.extend(self.light.update(brightness, now.hour, now.mono));
        }

        let display = TrackerDisplay {
            fall_candidate_for: self.fall.candidate_for(now.mono),
            fire: self
                .fire
                .progress(person_present, self.last_person_seen_at, now.mono),
            light_on: self.light.is_on(),
        };

        (triggers, display)
    }

    fn note_degraded(&mut self, degraded: BTreeSet<Modality>) {
        for modality in degraded.difference(&self.degraded) {
            warn!("{} detection unavailable, skipping its tracker", modality);
        }
        for modality in self.degraded.difference(&degraded) {
            info!("{} detection restored", modality);
        }
        self.degraded = degraded;
    }
}
