// THEORY:
// Video collaborators deliver frames on their own schedule and their own threads.
// The PID state inside a `ServoLoop` must never see two cycles at once, so every
// path from "a frame arrived" to `handle_frame` goes through one of two guards:
//
// 1.  **FrameGate** (drop while busy): for synchronous callbacks. The loop sits
//     behind a mutex; a callback that finds it locked drops its frame instead of
//     waiting, so a bursty camera can never build a backlog.
// 2.  **ServoWorker** (queue-of-one): a tokio task owns the loop outright and is
//     fed through a channel with room for exactly one pending frame. While one
//     frame is being processed a second can wait; anything beyond that is dropped.
//
// Either way the callback copies nothing it does not need and never holds on to
// the caller's buffer after returning.

use crate::display::FrameSink;
use crate::error::FrameError;
use crate::pipeline::{CycleReport, LoopStats, ServoLoop};
use crate::quit::QuitSignal;
use crate::transport::GimbalTransport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What became of an offered frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The frame ran through a full cycle on the caller's thread.
    Processed(Result<CycleReport, FrameError>),
    /// The frame is waiting in the worker's single slot.
    Queued,
    /// A cycle was in flight (or the slot was full); the frame was discarded.
    Dropped,
    /// The loop behind the gate has shut down.
    Closed,
}

/// Drop-while-busy guard for synchronous frame callbacks.
pub struct FrameGate<T, S> {
    servo: Arc<Mutex<ServoLoop<T, S>>>,
    dropped: Arc<AtomicU64>,
}

impl<T, S> Clone for FrameGate<T, S> {
    fn clone(&self) -> Self {
        Self {
            servo: Arc::clone(&self.servo),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<T: GimbalTransport, S: FrameSink> FrameGate<T, S> {
    pub fn new(servo: ServoLoop<T, S>) -> Self {
        Self {
            servo: Arc::new(Mutex::new(servo)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The callback body: runs a cycle if none is in flight, otherwise drops the frame.
    pub fn on_frame(&self, width: u32, height: u32, bytes: &[u8]) -> GateOutcome {
        let mut servo = match self.servo.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("cycle in flight, dropping frame");
                return GateOutcome::Dropped;
            }
            // A panicked cycle leaves PID state as it was after its last full step.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        GateOutcome::Processed(servo.handle_raw(width, height, bytes))
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> LoopStats {
        self.with_servo(|servo| servo.stats())
    }

    /// Runs `f` against the loop, waiting for any in-flight cycle.
    pub fn with_servo<R>(&self, f: impl FnOnce(&mut ServoLoop<T, S>) -> R) -> R {
        match self.servo.lock() {
            Ok(mut servo) => f(&mut servo),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

/// An owned frame on its way to the worker.
#[derive(Debug, Clone)]
pub struct FramePacket {
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Result of one worker cycle.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub frame_id: u64,
    pub result: Result<CycleReport, FrameError>,
}

/// Queue-of-one front end for a servo loop running in its own tokio task.
#[derive(Clone)]
pub struct ServoWorker {
    slot: mpsc::Sender<FramePacket>,
    dropped: Arc<AtomicU64>,
    next_frame_id: Arc<AtomicU64>,
}

impl ServoWorker {
    /// Moves `servo` into a task. The task ends when `quit` fires or every
    /// `ServoWorker` clone is dropped, and hands the loop back through the join handle.
    pub fn spawn<T, S>(
        mut servo: ServoLoop<T, S>,
        quit: QuitSignal,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerReport>, JoinHandle<ServoLoop<T, S>>)
    where
        T: GimbalTransport + Send + 'static,
        S: FrameSink + 'static,
    {
        let (slot, mut frames) = mpsc::channel::<FramePacket>(1);
        let (report_tx, report_rx) = mpsc::unbounded_channel::<WorkerReport>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = quit.wait() => {
                        info!("servo worker stopping on quit");
                        break;
                    }
                    packet = frames.recv() => {
                        let Some(packet) = packet else { break };
                        let result = servo.handle_raw(packet.width, packet.height, &packet.data);
                        // Nobody listening is fine.
                        let _ = report_tx.send(WorkerReport {
                            frame_id: packet.frame_id,
                            result,
                        });
                    }
                }
            }
            servo
        });

        let worker = Self {
            slot,
            dropped: Arc::new(AtomicU64::new(0)),
            next_frame_id: Arc::new(AtomicU64::new(0)),
        };
        (worker, report_rx, handle)
    }

    /// Copies the frame into the slot if it is free. Never blocks.
    pub fn offer(&self, width: u32, height: u32, bytes: &[u8]) -> GateOutcome {
        let frame_id = self.next_frame_id.fetch_add(1, Ordering::Relaxed);
        let packet = FramePacket {
            frame_id,
            width,
            height,
            data: bytes.to_vec(),
        };
        match self.slot.try_send(packet) {
            Ok(()) => GateOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(frame_id, "worker slot full, dropping frame");
                GateOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => GateOutcome::Closed,
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
