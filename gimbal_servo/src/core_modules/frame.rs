// THEORY:
// A `Frame` is a borrowed, read-only RGB8 view over a buffer handed to us by the
// video collaborator. The control loop never owns or retains it: the view lives
// exactly as long as the callback that received the bytes. Building the view is
// also the one place an input-shape problem can surface, so it is fallible.

use crate::error::FrameError;
use image::{ImageBuffer, Rgb, RgbImage};

pub const CHANNELS: usize = 3;

/// A borrowed RGB8 frame.
pub type Frame<'a> = ImageBuffer<Rgb<u8>, &'a [u8]>;

/// Wraps raw RGB8 bytes without copying. Fails if the payload length does not
/// match the declared dimensions.
pub fn frame_from_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Frame<'_>, FrameError> {
    let expected = width as usize * height as usize * CHANNELS;
    if bytes.len() != expected {
        return Err(FrameError::PayloadMismatch {
            width,
            height,
            expected,
            actual: bytes.len(),
        });
    }

    ImageBuffer::from_raw(width, height, bytes).ok_or(FrameError::PayloadMismatch {
        width,
        height,
        expected,
        actual: bytes.len(),
    })
}

/// Takes an owned copy of a borrowed frame, used as the canvas for overlays.
pub fn to_owned_frame(frame: &Frame<'_>) -> RgbImage {
    let (width, height) = frame.dimensions();
    // Dimensions were validated when the view was built.
    RgbImage::from_raw(width, height, frame.as_raw().to_vec())
        .unwrap_or_else(|| RgbImage::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_matching_payload() {
        let bytes = vec![7u8; 4 * 2 * CHANNELS];
        let frame = frame_from_bytes(4, 2, &bytes).unwrap();
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.get_pixel(3, 1).0, [7, 7, 7]);
    }

    #[test]
    fn rejects_short_payload() {
        let bytes = vec![0u8; 10];
        let err = frame_from_bytes(4, 2, &bytes).unwrap_err();
        assert_eq!(
            err,
            FrameError::PayloadMismatch {
                width: 4,
                height: 2,
                expected: 24,
                actual: 10
            }
        );
    }

    #[test]
    fn rejects_long_payload() {
        let bytes = vec![0u8; 25];
        assert!(frame_from_bytes(4, 2, &bytes).is_err());
    }
}
