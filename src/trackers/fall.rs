use log::debug;
use std::time::Duration;

use crate::alarms::AlarmType;
use crate::config::{secs, FallConfig};
use crate::detection::BoundingBox;
use crate::error::Error;

/// Watches for a person lying down long enough to count as a fall.
///
/// A single frame without a lying person restarts the episode. Detector
/// flicker can therefore discard most of an accumulated episode; this is
/// deliberate and matches the deployed behaviour.
#[derive(Debug, Clone)]
pub struct FallTracker {
    aspect_ratio_threshold: f64,
    min_duration: Duration,
    candidate_since: Option<Duration>,
}

impl FallTracker {
    pub fn new(aspect_ratio_threshold: f64, min_duration: Duration) -> Self {
        Self {
            aspect_ratio_threshold,
            min_duration,
            candidate_since: None,
        }
    }

    pub fn from_config(config: &FallConfig) -> Result<Self, Error> {
        Ok(Self::new(
            config.aspect_ratio_threshold,
            secs("fall.min_duration_secs", config.min_duration_secs)?,
        ))
    }

    /// Feed one frame's person boxes
    pub fn update(&mut self, persons: &[BoundingBox], now: Duration) -> Option<AlarmType> {
        let candidate = persons
            .iter()
            .any(|bbox| bbox.aspect_ratio() < self.aspect_ratio_threshold);

        if !candidate {
            if self.candidate_since.take().is_some() {
                debug!("Fall candidate lost, episode reset");
            }
            return None;
        }

        match self.candidate_since {
            None => {
                debug!("Fall candidate seen, starting timer");
                self.candidate_since = Some(now);
                None
            }
            Some(since) if now.saturating_sub(since) > self.min_duration => {
                self.candidate_since = None;
                Some(AlarmType::Fall)
            }
            Some(_) => None,
        }
    }

    /// How long the current candidate has been lying down, if any
    pub fn candidate_for(&self, now: Duration) -> Option<Duration> {
        self.candidate_since.map(|since| now.saturating_sub(since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lying() -> BoundingBox {
        BoundingBox::new(100.0, 300.0, 300.0, 400.0)
    }

    fn standing() -> BoundingBox {
        BoundingBox::new(100.0, 100.0, 180.0, 400.0)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn fires_once_candidate_outlasts_minimum() {
        let mut tracker = FallTracker::new(0.8, Duration::from_secs(2));

        assert_eq!(tracker.update(&[lying()], ms(0)), None);
        assert_eq!(tracker.update(&[lying()], ms(1000)), None);
        assert_eq!(tracker.update(&[lying()], ms(2000)), None, "threshold is strict");
        assert_eq!(tracker.update(&[lying()], ms(2100)), Some(AlarmType::Fall));

        // next frame starts a fresh episode
        assert_eq!(tracker.update(&[lying()], ms(2200)), None);
        assert_eq!(tracker.candidate_for(ms(2500)), Some(ms(300)));
    }

    #[test]
    fn any_lying_person_is_enough() {
        let mut tracker = FallTracker::new(0.8, Duration::from_secs(2));
        tracker.update(&[standing(), lying()], ms(0));
        assert_eq!(
            tracker.update(&[lying(), standing()], ms(2500)),
            Some(AlarmType::Fall)
        );
    }

    #[test]
    fn one_clear_frame_resets_the_episode() {
        let mut tracker = FallTracker::new(0.8, Duration::from_secs(2));
        tracker.update(&[lying()], ms(0));
        tracker.update(&[lying()], ms(1900));

        assert_eq!(tracker.update(&[standing()], ms(1950)), None);
        assert_eq!(tracker.candidate_for(ms(1950)), None);

        assert_eq!(tracker.update(&[lying()], ms(2000)), None);
        assert_eq!(tracker.update(&[lying()], ms(2500)), None);
        assert_eq!(tracker.update(&[lying()], ms(4100)), Some(AlarmType::Fall));
    }

    #[test]
    fn empty_frame_resets_the_episode() {
        let mut tracker = FallTracker::new(0.8, Duration::from_secs(2));
        tracker.update(&[lying()], ms(0));
        tracker.update(&[], ms(100));
        assert_eq!(tracker.candidate_for(ms(100)), None);
    }

    #[test]
    fn degenerate_boxes_are_ignored() {
        let mut tracker = FallTracker::new(0.8, Duration::from_secs(2));
        let flat = BoundingBox::new(50.0, 50.0, 50.0, 60.0);
        tracker.update(&[flat], ms(0));
        assert_eq!(tracker.candidate_for(ms(0)), None);
    }
}
