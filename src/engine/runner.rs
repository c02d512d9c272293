use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::aggregator::{Aggregator, Observation};
use super::state::MonitorState;
use crate::capture::{Frame, FrameSource};
use crate::clock::Clock;
use crate::config::Config;
use crate::detection::{BoundingBox, Detector};
use crate::error::Error;

/// Detection models available to the loop; a missing one degrades its modality
#[derive(Clone, Default)]
pub struct Detectors {
    pub person: Option<Arc<dyn Detector>>,
    pub fire: Option<Arc<dyn Detector>>,
}

/// The single producer: reads frames, runs detection, drives the trackers
/// and publishes the result for readers.
pub struct AggregationLoop<S: FrameSource> {
    source: S,
    detectors: Detectors,
    person_label: String,
    fire_label: String,
    restart_on_end: bool,
    clock: Arc<dyn Clock>,
    aggregator: Aggregator,
}

impl<S: FrameSource> AggregationLoop<S> {
    pub fn new(
        config: &Config,
        source: S,
        detectors: Detectors,
        clock: Arc<dyn Clock>,
        state: Arc<MonitorState>,
    ) -> Result<Self, Error> {
        let aggregator = Aggregator::new(config, state, clock.now().mono)?;
        Ok(Self {
            source,
            detectors,
            person_label: config.detection.person_label.clone(),
            fire_label: config.detection.fire_label.clone(),
            restart_on_end: config.capture.restart_on_end,
            clock,
            aggregator,
        })
    }

    /// Run until the stream ends, a live source fails, or `shutdown` fires.
    ///
    /// A source that cannot be opened is fatal and reported as an error
    /// status. On every other exit the source is released and the published
    /// status is replaced with a stopped marker.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), Error> {
        if let Err(e) = self.source.open().await {
            error!("Could not open frame source: {}", e);
            self.aggregator.state().publish_source_unavailable().await;
            return Err(e);
        }

        info!("Frame processing started");
        let result = self.process_frames(&shutdown).await;

        self.source.release();
        self.aggregator.state().publish_stopped().await;
        info!("Frame processing stopped");

        result
    }

    async fn process_frames(&mut self, shutdown: &CancellationToken) -> Result<(), Error> {
        // frames read since the last rewind; guards against spinning on an
        // empty or unreadable file
        let mut frames_since_rewind: u64 = 0;

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                read = self.source.read() => read,
            };

            match read {
                Ok(Some(frame)) => {
                    frames_since_rewind += 1;
                    self.process_frame(&frame).await;
                }
                Ok(None) => {
                    if !self.restart_on_end || self.source.is_live() {
                        info!("End of stream reached");
                        return Ok(());
                    }
                    if frames_since_rewind == 0 {
                        warn!("Source produced no frames after rewinding, stopping");
                        return Ok(());
                    }
                    info!("End of stream reached, restarting source");
                    self.source.rewind().await?;
                    frames_since_rewind = 0;
                }
                Err(e) if self.source.is_live() => {
                    error!("Failed to read from live source: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    if frames_since_rewind == 0 {
                        error!("Source unreadable right after rewinding: {}", e);
                        return Err(e);
                    }
                    warn!("Failed to read frame ({}), restarting source", e);
                    self.source.rewind().await?;
                    frames_since_rewind = 0;
                }
            }
        }
    }

    async fn process_frame(&mut self, frame: &Frame) {
        let now = self.clock.now();

        let persons = match &self.detectors.person {
            Some(detector) => match detector.detect(frame).await {
                Ok(detections) => Some(
                    detections
                        .into_iter()
                        .filter(|d| d.label == self.person_label)
                        .map(|d| d.bbox)
                        .collect::<Vec<BoundingBox>>(),
                ),
                Err(e) => {
                    debug!("Person detection failed on frame {}: {}", frame.index, e);
                    None
                }
            },
            None => None,
        };

        let fire = match &self.detectors.fire {
            Some(detector) => match detector.detect(frame).await {
                Ok(detections) => Some(detections.iter().any(|d| d.label == self.fire_label)),
                Err(e) => {
                    debug!("Fire detection failed on frame {}: {}", frame.index, e);
                    None
                }
            },
            None => None,
        };

        let observation = Observation {
            persons,
            fire,
            brightness: frame.mean_brightness(),
        };

        self.aggregator.ingest(&observation, &now).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::{AlarmType, Cooldowns};
    use crate::clock::ManualClock;
    use crate::detection::{Detection, Modality};
    use crate::replay::{RecordedFrame, ReplayDetector, ReplaySource, ReplayTrace};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedSource {
        open_fails: bool,
        live: bool,
        script: VecDeque<Result<Option<Frame>, Error>>,
        released: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(live: bool, script: Vec<Result<Option<Frame>, Error>>) -> Self {
            Self {
                open_fails: false,
                live,
                script: script.into(),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn open(&mut self) -> Result<(), Error> {
            if self.open_fails {
                Err(Error::Capture("camera missing".to_string()))
            } else {
                Ok(())
            }
        }

        async fn read(&mut self) -> Result<Option<Frame>, Error> {
            self.script.pop_front().unwrap_or(Ok(None))
        }

        async fn rewind(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn is_live(&self) -> bool {
            self.live
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingDetector {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Detector for CountingDetector {
        async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Detection("model not loaded".to_string()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn setup() -> (Config, Arc<ManualClock>, Arc<MonitorState>) {
        let clock = Arc::new(ManualClock::at_noon());
        let state = Arc::new(MonitorState::new(Cooldowns::default(), clock.clone()));
        (Config::default(), clock, state)
    }

    #[tokio::test]
    async fn open_failure_is_fatal_and_reported() {
        let (config, clock, state) = setup();
        let mut source = ScriptedSource::new(true, vec![]);
        source.open_fails = true;

        let runner =
            AggregationLoop::new(&config, source, Detectors::default(), clock, state.clone()).unwrap();
        let result = runner.run(CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Capture(_))));
        let report = state.get_status().await;
        assert_eq!(report.text, "Error: could not open the video source.");
    }

    #[tokio::test]
    async fn live_read_failure_stops_the_loop() {
        let (config, clock, state) = setup();
        let source = ScriptedSource::new(
            true,
            vec![
                Ok(Some(Frame::uniform(0, 2, 2, 40))),
                Err(Error::Capture("device unplugged".to_string())),
                Ok(Some(Frame::uniform(1, 2, 2, 40))),
            ],
        );
        let released = source.released.clone();
        let detector = Arc::new(CountingDetector {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let detectors = Detectors {
            person: Some(detector.clone()),
            fire: None,
        };

        let runner = AggregationLoop::new(&config, source, detectors, clock, state.clone()).unwrap();
        let result = runner.run(CancellationToken::new()).await;

        assert!(result.is_err());
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(state.get_status().await.text, "Processing stopped.");
    }

    #[tokio::test]
    async fn file_read_failure_rewinds_and_continues() {
        let (mut config, clock, state) = setup();
        config.capture.restart_on_end = false;
        let source = ScriptedSource::new(
            false,
            vec![
                Ok(Some(Frame::uniform(0, 2, 2, 40))),
                Err(Error::Capture("corrupt packet".to_string())),
                Ok(Some(Frame::uniform(0, 2, 2, 40))),
                Ok(None),
            ],
        );
        let detector = Arc::new(CountingDetector {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let detectors = Detectors {
            person: None,
            fire: Some(detector.clone()),
        };

        let runner = AggregationLoop::new(&config, source, detectors, clock, state).unwrap();
        runner.run(CancellationToken::new()).await.unwrap();
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_processes_nothing() {
        let (config, clock, state) = setup();
        let source = ScriptedSource::new(true, vec![Ok(Some(Frame::uniform(0, 2, 2, 40)))]);
        let released = source.released.clone();
        let token = CancellationToken::new();
        token.cancel();

        let runner =
            AggregationLoop::new(&config, source, Detectors::default(), clock, state.clone()).unwrap();
        runner.run(token).await.unwrap();

        assert_eq!(released.load(Ordering::SeqCst), 1);
        let report = state.get_status().await;
        assert_eq!(report.text, "Processing stopped.");
        assert_eq!(report.updated_at, None);
    }

    #[tokio::test]
    async fn failing_detector_degrades_only_its_modality() {
        let (mut config, clock, state) = setup();
        config.capture.restart_on_end = false;
        config.alarms.forgotten_light_cooldown_secs = 0.0;
        config.light.forgotten_secs = 0.0;
        let source = ScriptedSource::new(false, vec![Ok(Some(Frame::uniform(0, 2, 2, 200)))]);
        let detectors = Detectors {
            person: Some(Arc::new(CountingDetector {
                calls: AtomicUsize::new(0),
                fail: true,
            })),
            fire: None,
        };

        let runner = AggregationLoop::new(&config, source, detectors, clock, state.clone()).unwrap();
        runner.run(CancellationToken::new()).await.unwrap();

        // the light tracker kept working while person detection was down
        let report = state.get_status().await;
        assert_eq!(report.alarms.len(), 1);
        assert_eq!(report.alarms[0].alarm_type, AlarmType::ForgottenLight);
    }

    #[tokio::test]
    async fn degraded_modalities_are_published_while_running() {
        let (config, clock, state) = setup();
        let mut aggregator = Aggregator::new(&config, state.clone(), Duration::ZERO).unwrap();
        aggregator
            .ingest(
                &Observation {
                    persons: None,
                    fire: Some(false),
                    brightness: Some(20.0),
                },
                &clock.now(),
            )
            .await;

        assert_eq!(state.get_status().await.degraded, vec![Modality::Person]);
    }

    #[tokio::test]
    async fn replayed_trace_restarts_until_cancelled() -> anyhow::Result<()> {
        let (config, clock, state) = setup();
        let trace = Arc::new(ReplayTrace {
            frame_interval_ms: 1,
            frames: vec![
                RecordedFrame {
                    brightness: 30.0,
                    detections: Vec::new(),
                },
                RecordedFrame {
                    brightness: 30.0,
                    detections: Vec::new(),
                },
            ],
        });
        let detectors = Detectors {
            person: Some(Arc::new(ReplayDetector::new(
                trace.clone(),
                vec!["person".to_string()],
                0.6,
            ))),
            fire: None,
        };
        let token = CancellationToken::new();
        let runner = AggregationLoop::new(
            &config,
            ReplaySource::new(trace),
            detectors,
            clock,
            state.clone(),
        )?;
        let handle = tokio::spawn(runner.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.get_status().await.text, "Normal");

        token.cancel();
        handle.await??;
        assert_eq!(state.get_status().await.text, "Processing stopped.");
        Ok(())
    }
}
