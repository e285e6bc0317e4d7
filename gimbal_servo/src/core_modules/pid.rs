// THEORY:
// One `AxisPid` drives one gimbal axis. It is the only stateful piece of the
// control core: the integral accumulator and the previous error survive from one
// frame to the next, and nothing else does.
//
// The controller is discrete and frame-indexed, not time-indexed. Each call is
// one step:
//   integral   += error
//   derivative  = error - previous_error
//   raw         = kp*error + ki*integral + kd*derivative
//   output      = clamp(raw, min, max)
// Gains are per step; no dt scaling is applied.
//
// Anti-windup is a policy. `None` accumulates the integral unconditionally, even
// while the output sits on a clamp. `ConditionalIntegration` holds the integral
// still whenever the output is saturated and the new error would push it further
// into saturation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiWindup {
    #[default]
    None,
    ConditionalIntegration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Discrete PID controller for a single axis.
#[derive(Debug, Clone)]
pub struct AxisPid {
    gains: PidGains,
    min: f64,
    max: f64,
    anti_windup: AntiWindup,
    integral: f64,
    previous_error: f64,
}

impl AxisPid {
    /// `min <= max` is checked by the configuration layer.
    pub fn new(gains: PidGains, min: f64, max: f64, anti_windup: AntiWindup) -> Self {
        Self {
            gains,
            min,
            max,
            anti_windup,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    /// Advances the controller one step and returns the clamped command.
    pub fn output(&mut self, error: f64) -> f64 {
        let PidGains { kp, ki, kd } = self.gains;
        let derivative = error - self.previous_error;
        let mut integral = self.integral + error;

        let mut raw = kp * error + ki * integral + kd * derivative;

        if self.anti_windup == AntiWindup::ConditionalIntegration {
            let pushing_high = raw > self.max && error > 0.0;
            let pushing_low = raw < self.min && error < 0.0;
            if pushing_high || pushing_low {
                integral = self.integral;
                raw = kp * error + ki * integral + kd * derivative;
            }
        }

        self.integral = integral;
        self.previous_error = error;

        raw.clamp(self.min, self.max)
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn previous_error(&self) -> f64 {
        self.previous_error
    }
}
