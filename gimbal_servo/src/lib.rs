// THEORY:
// This file is the main entry point for the `gimbal_servo` library crate.
// It defines the public API exposed to binaries that own a camera and a gimbal
// (like the `servo_tester` runner).
//
// The primary export is `ServoLoop` and its report types (`CycleReport`,
// `Actuation`, `LoopStats`), together with the seams a host has to fill in:
// `GimbalTransport` for the actuator, `FrameSink`/`FrameDisplay` for the window,
// and `QuitPredicate` for deciding when to stop. The detection math in
// `core_modules` is public for testing and tooling but is not needed to run a
// loop.

pub mod config;
pub mod core_modules;
pub mod display;
pub mod error;
pub mod main_context;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod quit;
pub mod transport;

pub use config::{PidConfig, ServoConfig, ValidatedConfig};
pub use display::{FrameDisplay, FrameSink, MainContextSink, NullSink};
pub use error::{ConfigError, DisplayError, FrameError, ServoError, TransportError};
pub use main_context::{MainContext, MainContextHandle, main_context};
pub use parallel_pipeline::{FrameGate, GateOutcome, ServoWorker, WorkerReport};
pub use pipeline::{Actuation, CycleReport, LoopStats, ServoLoop, TrackingData};
pub use quit::{AfterCycles, NeverQuit, QuitPredicate, QuitSignal};
pub use transport::{ActuationCommand, ControlMode, GimbalTransport, RecordingTransport};
