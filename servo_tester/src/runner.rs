// THEORY:
// Wires a frame source, a servo loop, and a display together.
//
// Thread layout: the calling (main) thread runs the `MainContext` and owns the
// display. A producer thread pulls frames from the source and hands them to the
// in-flight guard. In `Queue` mode the loop itself runs on a tokio runtime.

use anyhow::{Context, anyhow};
use gimbal_servo::parallel_pipeline::WorkerReport;
use gimbal_servo::{
    ActuationCommand, AfterCycles, ControlMode, CycleReport, DisplayError, FrameDisplay, FrameGate,
    GateOutcome, GimbalTransport, LoopStats, MainContext, MainContextSink, QuitSignal, ServoLoop,
    ServoWorker, TransportError, ValidatedConfig, main_context,
};
use image::RgbImage;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const PUMP_INTERVAL: Duration = Duration::from_millis(5);

/// Where frames come from. Runs on the producer thread.
pub trait FrameSource: Send {
    /// `Ok(None)` ends the session.
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;

    /// Pause between frames. `None` delivers as fast as the guard accepts them.
    fn frame_interval(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// `FrameGate`: cycles run on the producer thread, busy frames are dropped.
    Drop,
    /// `ServoWorker`: cycles run in a tokio task with one pending slot.
    Queue,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub gate: GateMode,
    pub max_frames: Option<u64>,
    pub blocking_display: bool,
    /// Directory for per-cycle segmentation masks. Created if missing.
    pub mask_dir: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            gate: GateMode::Drop,
            max_frames: None,
            blocking_display: false,
            mask_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOutcome {
    pub stats: LoopStats,
    pub frames_offered: u64,
    pub dropped_frames: u64,
    /// Annotated frames replaced before the display showed them.
    pub superseded_frames: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct ProducerReport {
    offered: u64,
    dropped: u64,
}

/// Logs every command instead of moving hardware.
#[derive(Debug, Default)]
pub struct LoggingTransport {
    sent: u64,
}

impl GimbalTransport for LoggingTransport {
    fn send(&mut self, command: ActuationCommand, mode: ControlMode) -> Result<(), TransportError> {
        self.sent += 1;
        info!(n = self.sent, x = command.x, y = command.y, ?mode, "gimbal command");
        Ok(())
    }
}

/// Accepts every frame and shows nothing.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    pub shown: u64,
}

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, _frame: &RgbImage) -> Result<(), DisplayError> {
        self.shown += 1;
        Ok(())
    }
}

pub fn run<D, S, T>(
    config: &ValidatedConfig,
    display: D,
    source: S,
    transport: T,
    options: RunOptions,
) -> anyhow::Result<RunOutcome>
where
    D: FrameDisplay + 'static,
    S: FrameSource + 'static,
    T: GimbalTransport + Send + 'static,
{
    run_with_quit(config, display, source, transport, options, QuitSignal::new())
}

/// Like [`run`], with a quit signal the caller (or the display) may also fire.
pub fn run_with_quit<D, S, T>(
    config: &ValidatedConfig,
    display: D,
    source: S,
    transport: T,
    options: RunOptions,
    quit: QuitSignal,
) -> anyhow::Result<RunOutcome>
where
    D: FrameDisplay + 'static,
    S: FrameSource + 'static,
    T: GimbalTransport + Send + 'static,
{
    let (mut context, handle) = main_context(display);
    let sink = MainContextSink::new(handle, options.blocking_display);
    let mut servo = ServoLoop::new(config, transport, sink, quit.clone());
    if let Some(limit) = options.max_frames {
        servo = servo.with_quit_predicate(AfterCycles::new(limit));
    }
    if let Some(dir) = &options.mask_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create mask directory {}", dir.display()))?;
        servo = servo.with_mask_dump(dir.clone());
    }

    match options.gate {
        GateMode::Drop => {
            let gate = FrameGate::new(servo);
            let producer = {
                let gate = gate.clone();
                spawn_producer(source, quit.clone(), true, move |w, h, bytes| {
                    gate.on_frame(w, h, bytes)
                })
            };

            drive(&mut context, &quit, || producer.is_finished());
            let report = join_producer(producer)?;
            Ok(RunOutcome {
                stats: gate.stats(),
                frames_offered: report.offered,
                dropped_frames: report.dropped,
                superseded_frames: gate.with_servo(|servo| servo.sink().superseded_frames()),
            })
        }
        GateMode::Queue => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start tokio runtime")?;

            let (worker, reports, handle) = {
                let _guard = runtime.enter();
                ServoWorker::spawn(servo, quit.clone())
            };
            runtime.spawn(log_reports(reports));
            // The worker ends once the producer drops its handle; then the main context may stop.
            let finisher = runtime.spawn({
                let quit = quit.clone();
                async move {
                    let servo = handle.await;
                    quit.fire();
                    servo
                }
            });

            let producer = spawn_producer(source, quit.clone(), false, move |w, h, bytes| {
                worker.offer(w, h, bytes)
            });

            drive(&mut context, &quit, || finisher.is_finished());
            let report = join_producer(producer)?;
            let servo = runtime.block_on(finisher)??;
            Ok(RunOutcome {
                stats: servo.stats(),
                frames_offered: report.offered,
                dropped_frames: report.dropped,
                superseded_frames: servo.sink().superseded_frames(),
            })
        }
    }
}

/// Runs the main context until `quit`, then keeps draining jobs until the
/// pipeline has finished, so a cycle blocked on presentation can complete.
fn drive<D: FrameDisplay + 'static>(
    context: &mut MainContext<D>,
    quit: &QuitSignal,
    finished: impl Fn() -> bool,
) {
    context.run_until(quit, PUMP_INTERVAL);
    while !finished() {
        context.run_pending();
        thread::sleep(PUMP_INTERVAL);
    }
    context.run_pending();
}

fn spawn_producer<S, F>(
    mut source: S,
    quit: QuitSignal,
    fire_quit_when_done: bool,
    mut deliver: F,
) -> thread::JoinHandle<anyhow::Result<ProducerReport>>
where
    S: FrameSource + 'static,
    F: FnMut(u32, u32, &[u8]) -> GateOutcome + Send + 'static,
{
    thread::spawn(move || {
        let mut report = ProducerReport::default();
        let result = (|| -> anyhow::Result<()> {
            let interval = source.frame_interval();
            while !quit.is_fired() {
                let Some(frame) = source.next_frame()? else {
                    info!("frame source exhausted");
                    break;
                };
                report.offered += 1;
                match deliver(frame.width(), frame.height(), frame.as_raw()) {
                    GateOutcome::Dropped => report.dropped += 1,
                    GateOutcome::Closed => break,
                    GateOutcome::Processed(Ok(CycleReport::Tracking(data))) => {
                        debug!(err_x = data.error.x, err_y = data.error.y, "tracking");
                    }
                    _ => {}
                }
                if let Some(interval) = interval {
                    thread::sleep(interval);
                }
            }
            Ok(())
        })();

        if let Err(e) = &result {
            warn!("frame source failed: {e:#}");
        }
        if fire_quit_when_done {
            quit.fire();
        }
        drop(deliver);
        result.map(|()| report)
    })
}

fn join_producer(
    producer: thread::JoinHandle<anyhow::Result<ProducerReport>>,
) -> anyhow::Result<ProducerReport> {
    producer.join().map_err(|_| anyhow!("frame producer panicked"))?
}

async fn log_reports(mut reports: mpsc::UnboundedReceiver<WorkerReport>) {
    while let Some(report) = reports.recv().await {
        if let Ok(CycleReport::Tracking(data)) = report.result {
            debug!(
                frame_id = report.frame_id,
                err_x = data.error.x,
                err_y = data.error.y,
                "tracking"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimbal_servo::ServoConfig;

    struct Blank {
        remaining: u32,
    }

    impl FrameSource for Blank {
        fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(RgbImage::new(64, 48)))
        }
    }

    fn config() -> ValidatedConfig {
        ServoConfig {
            width: 64,
            height: 48,
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn drop_mode_processes_every_frame_of_an_unpaced_source() {
        let outcome = run(
            &config(),
            HeadlessDisplay::default(),
            Blank { remaining: 5 },
            LoggingTransport::default(),
            RunOptions::default(),
        )
        .unwrap();
        assert_eq!(outcome.frames_offered, 5);
        assert_eq!(outcome.stats.cycles, 5);
        assert_eq!(outcome.stats.idle_cycles, 5);
    }

    #[test]
    fn max_frames_stops_the_session() {
        let options = RunOptions {
            max_frames: Some(3),
            blocking_display: true,
            ..Default::default()
        };
        let outcome = run(
            &config(),
            HeadlessDisplay::default(),
            Blank { remaining: 100 },
            LoggingTransport::default(),
            options,
        )
        .unwrap();
        assert_eq!(outcome.stats.cycles, 3);
    }

    #[test]
    fn masks_are_written_when_requested() {
        let dir = std::env::temp_dir().join("servo_tester_runner_masks");
        let _ = std::fs::remove_dir_all(&dir);
        let options = RunOptions {
            mask_dir: Some(dir.clone()),
            ..Default::default()
        };
        let outcome = run(
            &config(),
            HeadlessDisplay::default(),
            Blank { remaining: 3 },
            LoggingTransport::default(),
            options,
        )
        .unwrap();
        assert_eq!(outcome.stats.cycles, 3);
        for cycle in 1..=3 {
            assert!(dir.join(format!("mask_{cycle:05}.png")).is_file());
        }
    }

    #[test]
    fn queue_mode_accounts_for_every_frame() {
        let options = RunOptions {
            gate: GateMode::Queue,
            ..Default::default()
        };
        let outcome = run(
            &config(),
            HeadlessDisplay::default(),
            Blank { remaining: 20 },
            LoggingTransport::default(),
            options,
        )
        .unwrap();
        assert_eq!(outcome.frames_offered, 20);
        assert_eq!(outcome.stats.cycles + outcome.dropped_frames, 20);
    }
}
