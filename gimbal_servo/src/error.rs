// THEORY:
// Errors are split by when they can happen. `ConfigError` only surfaces at
// startup and is fatal. `FrameError` drops one frame. `TransportError` and
// `DisplayError` come back from collaborators and are counted, never retried.

use thiserror::Error;

/// Startup-time configuration errors. Any of these aborts before the first frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid hsv values: expected 3 comma-separated components, got {0}")]
    Arity(usize),

    #[error("invalid {channel} value: {value:?}")]
    Component { channel: char, value: String },

    #[error("{channel} value {value} is outside 0..={max}")]
    OutOfDomain { channel: char, value: u16, max: u16 },

    #[error("color range lower bound exceeds upper bound on {channel}: {lower} > {upper}")]
    InvertedRange { channel: char, lower: u8, upper: u8 },

    #[error("{axis} pid: {reason}")]
    Gains { axis: &'static str, reason: String },

    #[error("invalid {field}: {reason}")]
    Field { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Toml(String),
}

/// Per-frame input-shape errors. The frame is dropped and the loop continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame payload is {actual} bytes, {width}x{height} rgb8 needs {expected}")]
    PayloadMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("frame is {actual:?}, expected {expected:?}")]
    UnexpectedResolution {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Returned by an actuator transport when a command could not be delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gimbal link unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("main context is gone")]
    Disconnected,

    #[error("display backend error: {0}")]
    Backend(String),
}

/// Umbrella error for callers that drive the whole engine.
#[derive(Error, Debug)]
pub enum ServoError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("display error: {0}")]
    Display(#[from] DisplayError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ServoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = ConfigError::Component {
            channel: 's',
            value: "1.5".into(),
        };
        assert_eq!(err.to_string(), "invalid s value: \"1.5\"");

        let err: ServoError = FrameError::UnexpectedResolution {
            expected: (640, 480),
            actual: (320, 240),
        }
        .into();
        assert!(matches!(err, ServoError::Frame(_)));
    }
}
