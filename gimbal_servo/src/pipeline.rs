// THEORY:
// The `pipeline` module is the top-level API of the servo engine. `ServoLoop`
// encapsulates one complete detection-to-actuation cycle behind a single call:
// hand it a frame, and it segments, selects, normalizes, runs the PIDs, talks to
// the gimbal and the display, and reports what happened.
//
// Per-frame state machine:
//   Idle      no object this frame -> show the frame untouched, no command.
//   Tracking  object found -> overlay the detection, compute the error, and unless
//             the error sits inside the deadband, send one command.
// The state is decided afresh every frame; only the PID controllers carry memory.
//
// `handle_frame` takes `&mut self`, so a single `ServoLoop` can never run two
// cycles at once. Wrappers in `parallel_pipeline` decide what happens to frames
// that arrive while a cycle is in flight.

use crate::config::{ServoConfig, ValidatedConfig};
use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::color_segmenter::ColorSegmenter;
use crate::core_modules::frame::{Frame, frame_from_bytes, to_owned_frame};
use crate::core_modules::image_helper::image_helper;
use crate::core_modules::pid::AxisPid;
use crate::display::FrameSink;
use crate::error::FrameError;
use crate::quit::{NeverQuit, QuitPredicate, QuitSignal};
use crate::transport::{ActuationCommand, ControlMode, GimbalTransport};
use image::GrayImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::detected_object::{DetectedObject, Point};
pub use crate::core_modules::error_normalizer::{NormalizedError, normalize};

/// What happened to the actuator this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Actuation {
    /// Error inside the deadband; nothing to correct.
    Skipped,
    Sent(ActuationCommand),
    /// The transport reported a failure. Not retried.
    Failed(ActuationCommand),
}

/// Details of a cycle that found the object.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingData {
    pub object: DetectedObject,
    pub error: NormalizedError,
    pub actuation: Actuation,
}

/// The primary output of the servo loop for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    Idle,
    Tracking(TrackingData),
}

impl CycleReport {
    pub fn command(&self) -> Option<ActuationCommand> {
        match self {
            CycleReport::Tracking(TrackingData {
                actuation: Actuation::Sent(command) | Actuation::Failed(command),
                ..
            }) => Some(*command),
            _ => None,
        }
    }
}

/// Running counters, kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub idle_cycles: u64,
    pub tracking_cycles: u64,
    pub commands_sent: u64,
    pub transport_failures: u64,
    pub frame_errors: u64,
    pub display_failures: u64,
}

/// One closed control loop: detector, two axis PIDs, a gimbal, and a display.
pub struct ServoLoop<T, S> {
    resolution: (u32, u32),
    segmenter: ColorSegmenter,
    min_radius: f64,
    deadband: f64,
    control_mode: ControlMode,
    pid_yaw: AxisPid,
    pid_pitch: AxisPid,
    transport: T,
    sink: S,
    quit_predicate: Box<dyn QuitPredicate>,
    quit: QuitSignal,
    mask_dir: Option<PathBuf>,
    stats: LoopStats,
}

impl<T: GimbalTransport, S: FrameSink> ServoLoop<T, S> {
    pub fn new(config: &ValidatedConfig, transport: T, sink: S, quit: QuitSignal) -> Self {
        info!(
            lower = %config.color_range.lower(),
            upper = %config.color_range.upper(),
            width = config.resolution.0,
            height = config.resolution.1,
            "servo loop configured"
        );
        Self {
            resolution: config.resolution,
            segmenter: ColorSegmenter::new(config.color_range, config.cleanup_passes),
            min_radius: config.min_radius,
            deadband: config.deadband,
            control_mode: config.control_mode,
            pid_yaw: config.yaw.build(),
            pid_pitch: config.pitch.build(),
            transport,
            sink,
            quit_predicate: Box::new(NeverQuit),
            quit,
            mask_dir: None,
            stats: LoopStats::default(),
        }
    }

    /// Validates a raw config and builds a loop from it.
    pub fn from_config(
        config: &ServoConfig,
        transport: T,
        sink: S,
        quit: QuitSignal,
    ) -> crate::error::Result<Self> {
        Ok(Self::new(&config.validate()?, transport, sink, quit))
    }

    /// Replaces the per-cycle quit predicate (default: never quit).
    pub fn with_quit_predicate(mut self, predicate: impl QuitPredicate + 'static) -> Self {
        self.quit_predicate = Box::new(predicate);
        self
    }

    /// Writes every cycle's segmentation mask to `dir` as `mask_NNNNN.png`.
    /// The directory must already exist.
    pub fn with_mask_dump(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mask_dir = Some(dir.into());
        self
    }

    /// Entry point for raw callback buffers. The bytes are only borrowed for
    /// the duration of the call.
    pub fn handle_raw(
        &mut self,
        width: u32,
        height: u32,
        bytes: &[u8],
    ) -> Result<CycleReport, FrameError> {
        let frame = frame_from_bytes(width, height, bytes).inspect_err(|e| {
            self.stats.frame_errors += 1;
            warn!("dropping frame: {e}");
        })?;
        self.handle_frame(&frame)
    }

    /// Runs one full control cycle.
    pub fn handle_frame(&mut self, frame: &Frame<'_>) -> Result<CycleReport, FrameError> {
        if frame.dimensions() != self.resolution {
            self.stats.frame_errors += 1;
            let err = FrameError::UnexpectedResolution {
                expected: self.resolution,
                actual: frame.dimensions(),
            };
            warn!("dropping frame: {err}");
            return Err(err);
        }

        self.stats.cycles += 1;
        let mut output_frame = to_owned_frame(frame);

        // --- 1. Detection ---
        let (mask, detection) = self.detect_with_mask(frame);
        if let Some(dir) = &self.mask_dir {
            if let Err(e) = dump_mask(dir, self.stats.cycles, &mask) {
                warn!("failed to dump mask: {e}");
            }
        }

        let report = match detection {
            None => {
                // --- 2. Idle ---
                self.stats.idle_cycles += 1;
                CycleReport::Idle
            }
            Some(object) => {
                // --- 3. Tracking ---
                self.stats.tracking_cycles += 1;
                image_helper::draw_detection(&mut output_frame, &object);

                let (width, height) = self.resolution;
                let error = normalize(object.centroid, width, height);
                debug!(err_x = error.x, err_y = error.y, radius = object.radius, "object found");

                let actuation = if error.within(self.deadband) {
                    Actuation::Skipped
                } else {
                    self.actuate(error)
                };

                CycleReport::Tracking(TrackingData {
                    object,
                    error,
                    actuation,
                })
            }
        };

        // --- 4. Display (both branches) ---
        if let Err(e) = self.sink.present(output_frame) {
            self.stats.display_failures += 1;
            warn!("display rejected frame: {e}");
        }

        // --- 5. Quit check ---
        if self.quit_predicate.should_quit() && self.quit.fire() {
            info!("quit predicate fired after {} cycles", self.stats.cycles);
        }

        Ok(report)
    }

    /// Segments the frame and returns the largest in-range object, if it is big enough.
    pub fn detect(&self, frame: &Frame<'_>) -> Option<DetectedObject> {
        self.detect_with_mask(frame).1
    }

    /// Like [`detect`](Self::detect), also returning the foreground mask.
    pub fn detect_with_mask(&self, frame: &Frame<'_>) -> (GrayImage, Option<DetectedObject>) {
        let mask = self.segmenter.segment(frame);
        let object = blob_detector::find_largest_object(&mask)
            .filter(|object| object.radius >= self.min_radius);
        (mask, object)
    }

    fn actuate(&mut self, error: NormalizedError) -> Actuation {
        let output_x = self.pid_yaw.output(error.x);
        let output_y = self.pid_pitch.output(error.y);
        debug!(x = output_x, y = output_y, "pid outputs");

        // Positive pitch output must move the gimbal the other way vertically.
        let command = ActuationCommand::new(output_x, -output_y);
        match self.transport.send(command, self.control_mode) {
            Ok(()) => {
                self.stats.commands_sent += 1;
                Actuation::Sent(command)
            }
            Err(e) => {
                self.stats.transport_failures += 1;
                warn!("gimbal command failed: {e}");
                Actuation::Failed(command)
            }
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn quit_signal(&self) -> &QuitSignal {
        &self.quit
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn dump_mask(dir: &Path, cycle: u64, mask: &GrayImage) -> crate::error::Result<()> {
    image_helper::save_mask(&dir.join(format!("mask_{cycle:05}.png")), mask)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::NullSink;
    use crate::error::{DisplayError, TransportError};
    use crate::quit::AfterCycles;
    use crate::transport::RecordingTransport;
    use image::{Rgb, RgbImage};

    const W: u32 = 160;
    const H: u32 = 120;
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    fn config() -> ValidatedConfig {
        ServoConfig {
            width: W,
            height: H,
            cleanup_passes: 0,
            min_radius: 0.0,
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn frame_with_disc(cx: f64, cy: f64, r: f64) -> RgbImage {
        let mut image = RgbImage::from_pixel(W, H, Rgb([40, 40, 40]));
        image_helper::fill_disc(&mut image, (cx, cy), r, GREEN);
        image
    }

    #[derive(Default)]
    struct KeepLast {
        frames: Vec<RgbImage>,
    }

    impl FrameSink for KeepLast {
        fn present(&mut self, frame: RgbImage) -> Result<(), DisplayError> {
            self.frames.push(frame);
            Ok(())
        }
    }

    fn servo() -> ServoLoop<RecordingTransport, KeepLast> {
        ServoLoop::new(
            &config(),
            RecordingTransport::default(),
            KeepLast::default(),
            QuitSignal::new(),
        )
    }

    #[test]
    fn idle_cycle_shows_frame_unchanged_and_sends_nothing() {
        let mut servo = servo();
        let image = RgbImage::from_pixel(W, H, Rgb([40, 40, 40]));

        let report = servo.handle_raw(W, H, image.as_raw()).unwrap();

        assert_eq!(report, CycleReport::Idle);
        assert!(servo.transport().sent.is_empty());
        assert_eq!(servo.sink().frames.len(), 1);
        assert_eq!(servo.sink().frames[0], image);
    }

    #[test]
    fn off_center_object_sends_one_command() {
        let mut servo = servo();
        let image = frame_with_disc(120.0, 30.0, 8.0);

        let report = servo.handle_raw(W, H, image.as_raw()).unwrap();

        let CycleReport::Tracking(data) = report else {
            panic!("expected a tracking cycle");
        };
        assert!((data.error.x - 0.25).abs() < 1e-9);
        assert!((data.error.y - 0.25).abs() < 1e-9);
        let Actuation::Sent(command) = data.actuation else {
            panic!("expected a sent command");
        };
        // Yaw follows errX; pitch output is negated.
        assert!((command.x - 0.7 * 0.25).abs() < 1e-9);
        assert!((command.y + 0.7 * 0.25).abs() < 1e-9);
        assert_eq!(servo.transport().sent, vec![(command, ControlMode::Sdk)]);
        assert_ne!(servo.sink().frames[0], image, "overlay should be drawn");
    }

    #[test]
    fn centered_object_skips_actuation() {
        let mut servo = servo();
        let image = frame_with_disc(80.0, 60.0, 6.0);

        let report = servo.handle_raw(W, H, image.as_raw()).unwrap();

        match report {
            CycleReport::Tracking(data) => {
                assert_eq!(data.error, NormalizedError { x: 0.0, y: 0.0 });
                assert_eq!(data.actuation, Actuation::Skipped);
            }
            other => panic!("expected tracking, got {other:?}"),
        }
        assert!(servo.transport().sent.is_empty());
    }

    #[test]
    fn deadband_absorbs_small_errors() {
        let config = ServoConfig {
            width: W,
            height: H,
            cleanup_passes: 0,
            min_radius: 0.0,
            deadband: 0.05,
            ..Default::default()
        }
        .validate()
        .unwrap();
        let mut servo = ServoLoop::new(
            &config,
            RecordingTransport::default(),
            NullSink,
            QuitSignal::new(),
        );
        // One pixel right of center: errX = 1/160.
        let image = frame_with_disc(81.0, 60.0, 6.0);

        let report = servo.handle_raw(W, H, image.as_raw()).unwrap();
        assert_eq!(report.command(), None);
        assert!(servo.transport().sent.is_empty());
    }

    #[test]
    fn transport_failure_is_reported_and_the_loop_continues() {
        let mut servo = servo();
        servo.transport_mut().fail_with = Some(TransportError::Unavailable("offline".into()));
        let image = frame_with_disc(20.0, 20.0, 5.0);

        for _ in 0..3 {
            let report = servo.handle_raw(W, H, image.as_raw()).unwrap();
            assert!(matches!(
                report,
                CycleReport::Tracking(TrackingData { actuation: Actuation::Failed(_), .. })
            ));
        }
        let stats = servo.stats();
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.transport_failures, 3);
        assert_eq!(stats.commands_sent, 0);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let mut servo = servo();
        assert!(matches!(
            servo.handle_raw(W, H, &[0u8; 12]),
            Err(FrameError::PayloadMismatch { .. })
        ));

        let small = RgbImage::new(10, 10);
        assert!(matches!(
            servo.handle_raw(10, 10, small.as_raw()),
            Err(FrameError::UnexpectedResolution { .. })
        ));

        let stats = servo.stats();
        assert_eq!(stats.frame_errors, 2);
        assert_eq!(stats.cycles, 0);
        assert!(servo.sink().frames.is_empty());

        // The next good frame is processed normally.
        let image = frame_with_disc(20.0, 20.0, 5.0);
        assert!(servo.handle_raw(W, H, image.as_raw()).is_ok());
    }

    #[test]
    fn objects_below_min_radius_are_ignored() {
        let config = ServoConfig {
            width: W,
            height: H,
            cleanup_passes: 0,
            min_radius: 10.0,
            ..Default::default()
        }
        .validate()
        .unwrap();
        let mut servo = ServoLoop::new(
            &config,
            RecordingTransport::default(),
            NullSink,
            QuitSignal::new(),
        );

        let small = frame_with_disc(30.0, 30.0, 4.0);
        assert_eq!(servo.handle_raw(W, H, small.as_raw()).unwrap(), CycleReport::Idle);

        let large = frame_with_disc(50.0, 50.0, 12.0);
        assert!(matches!(
            servo.handle_raw(W, H, large.as_raw()).unwrap(),
            CycleReport::Tracking(_)
        ));
    }

    #[test]
    fn from_config_rejects_bad_ranges() {
        let config = ServoConfig {
            hsv_lower: "200,0,0".into(),
            ..Default::default()
        };
        let result = ServoLoop::from_config(
            &config,
            RecordingTransport::default(),
            NullSink,
            QuitSignal::new(),
        );
        assert!(matches!(result, Err(crate::error::ServoError::Config(_))));
    }

    #[test]
    fn masks_are_dumped_per_cycle() {
        let dir = std::env::temp_dir().join("gimbal_servo_mask_dump_test");
        std::fs::create_dir_all(&dir).unwrap();
        let mut servo = servo().with_mask_dump(&dir);

        let image = frame_with_disc(40.0, 30.0, 6.0);
        servo.handle_raw(W, H, image.as_raw()).unwrap();

        let mask = image::open(dir.join("mask_00001.png")).unwrap().to_luma8();
        assert_eq!(mask.dimensions(), (W, H));
        assert_eq!(mask.get_pixel(40, 30).0[0], 255);
        assert_eq!(mask.get_pixel(5, 5).0[0], 0);
    }

    #[test]
    fn failed_mask_dump_does_not_stop_the_cycle() {
        let missing = std::env::temp_dir().join("gimbal_servo_no_such_dir").join("nested");
        let mut servo = servo().with_mask_dump(missing);

        let image = frame_with_disc(40.0, 30.0, 6.0);
        let report = servo.handle_raw(W, H, image.as_raw()).unwrap();
        assert!(matches!(report, CycleReport::Tracking(_)));
        assert_eq!(servo.transport().sent.len(), 1);
    }

    #[test]
    fn mask_matches_the_detection() {
        let servo = servo();
        let image = frame_with_disc(100.0, 70.0, 8.0);
        let frame = frame_from_bytes(W, H, image.as_raw()).unwrap();

        let (mask, object) = servo.detect_with_mask(&frame);
        let object = object.unwrap();
        let foreground = mask.pixels().filter(|p| p.0[0] == 255).count();
        assert_eq!(foreground, object.area);
    }

    #[test]
    fn quit_predicate_fires_the_signal() {
        let quit = QuitSignal::new();
        let mut servo = ServoLoop::new(
            &config(),
            RecordingTransport::default(),
            NullSink,
            quit.clone(),
        )
        .with_quit_predicate(AfterCycles::new(2));
        let image = RgbImage::new(W, H);

        servo.handle_raw(W, H, image.as_raw()).unwrap();
        assert!(!quit.is_fired());
        servo.handle_raw(W, H, image.as_raw()).unwrap();
        assert!(quit.is_fired());
    }

    #[test]
    fn pid_state_carries_across_cycles() {
        let config = ServoConfig {
            width: W,
            height: H,
            cleanup_passes: 0,
            min_radius: 0.0,
            yaw: crate::config::PidConfig {
                kp: 0.0,
                ki: 0.1,
                ..Default::default()
            },
            ..Default::default()
        }
        .validate()
        .unwrap();
        let mut servo = ServoLoop::new(
            &config,
            RecordingTransport::default(),
            NullSink,
            QuitSignal::new(),
        );
        let image = frame_with_disc(120.0, 60.0, 5.0);

        let first = servo.handle_raw(W, H, image.as_raw()).unwrap().command().unwrap();
        let second = servo.handle_raw(W, H, image.as_raw()).unwrap().command().unwrap();
        assert!((first.x - 0.025).abs() < 1e-9);
        assert!((second.x - 0.05).abs() < 1e-9);
    }
}
