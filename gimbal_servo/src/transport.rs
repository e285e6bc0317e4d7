// THEORY:
// Actuator transport seam.
//
// The control loop only knows how to build an `ActuationCommand` and hand it
// over. Getting it to the physical gimbal (a robot SDK, a serial link, a
// simulator) is the transport's job, and its outcome is just `Ok`/`Err`.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};

/// Normalized stick deflection, each component in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuationCommand {
    /// Yaw deflection, positive turns right.
    pub x: f64,
    /// Pitch deflection.
    pub y: f64,
}

impl ActuationCommand {
    /// Builds a command, clamping both components into `[-1, 1]`.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
        }
    }
}

/// Operating mode tag passed along with every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Commands come from a program.
    #[default]
    Sdk,
    /// Commands mimic a first-person-view stick.
    Fpv,
}

/// Delivers commands to the gimbal. Fire-and-forget from the loop's view:
/// failures are reported, never retried.
pub trait GimbalTransport {
    fn send(&mut self, command: ActuationCommand, mode: ControlMode) -> Result<(), TransportError>;
}

impl<T: GimbalTransport + ?Sized> GimbalTransport for Box<T> {
    fn send(&mut self, command: ActuationCommand, mode: ControlMode) -> Result<(), TransportError> {
        (**self).send(command, mode)
    }
}

/// Records every command it receives. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<(ActuationCommand, ControlMode)>,
    /// When set, every send fails with this error after being recorded.
    pub fail_with: Option<TransportError>,
}

impl GimbalTransport for RecordingTransport {
    fn send(&mut self, command: ActuationCommand, mode: ControlMode) -> Result<(), TransportError> {
        self.sent.push((command, mode));
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
