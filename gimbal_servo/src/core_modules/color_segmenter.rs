// THEORY:
// The `ColorSegmenter` is the first stage of every control cycle. It turns a
// frame into a binary mask: a pixel is foreground when its HSV value falls
// inside the configured `ColorRange`, inclusive on every channel.
//
// Key architectural principles:
// 1.  **Stateless Utility**: Like the blob detector, it holds no memory between
//     frames. The same frame and range always yield the same mask.
// 2.  **Mask as an Image**: The mask is a `GrayImage` (255 = foreground, 0 =
//     background) so it can be dumped to disk with the same tooling as frames.
// 3.  **Speckle Cleanup**: Sensor noise produces isolated in-range pixels. An
//     optional opening pass (erode N times, then dilate N times, 3x3 kernel)
//     removes them before the blob stage sees the mask.

use crate::core_modules::color_range::ColorRange;
use crate::core_modules::frame::Frame;
use crate::core_modules::hsv_pixel::hsv_pixel::HsvPixel;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Produces foreground masks for a fixed color range.
#[derive(Debug, Clone)]
pub struct ColorSegmenter {
    range: ColorRange,
    /// Number of erode passes followed by the same number of dilate passes.
    cleanup_passes: u32,
}

impl ColorSegmenter {
    pub fn new(range: ColorRange, cleanup_passes: u32) -> Self {
        Self {
            range,
            cleanup_passes,
        }
    }

    pub fn range(&self) -> &ColorRange {
        &self.range
    }

    /// Builds the mask for one frame.
    pub fn segment(&self, frame: &Frame<'_>) -> GrayImage {
        let (width, height) = frame.dimensions();
        let mut mask = GrayImage::new(width, height);

        for (x, y, pixel) in frame.enumerate_pixels() {
            if self.range.contains(HsvPixel::from(*pixel)) {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }

        // LInf with k = 1 is the 3x3 square kernel.
        for _ in 0..self.cleanup_passes {
            mask = erode(&mask, Norm::LInf, 1);
        }
        for _ in 0..self.cleanup_passes {
            mask = dilate(&mask, Norm::LInf, 1);
        }

        mask
    }
}
