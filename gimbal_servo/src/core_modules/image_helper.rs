// THEORY:
// Debug visualization helpers. Everything here is purely observational: the
// control loop renders the detection onto a copy of the frame and hands that copy
// to the display collaborator. Nothing drawn here ever feeds back into control.

pub mod image_helper {
    use crate::core_modules::detected_object::DetectedObject;
    use image::{GrayImage, ImageEncoder, Rgb, RgbImage};
    use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};
    use std::path::Path;

    /// Outline color of the enclosing circle (cyan).
    pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 255]);
    pub const OVERLAY_THICKNESS: i32 = 2;
    const MARKER_HALF_LENGTH: f32 = 4.0;

    fn pixel(point: (f64, f64)) -> (i32, i32) {
        (point.0.round() as i32, point.1.round() as i32)
    }

    /// Draws the enclosing circle and a small cross on the centroid.
    pub fn draw_detection(canvas: &mut RgbImage, object: &DetectedObject) {
        let center = pixel(object.centroid);
        let radius = object.radius.round() as i32;
        for ring in radius..radius + OVERLAY_THICKNESS {
            draw_hollow_circle_mut(canvas, center, ring, OVERLAY_COLOR);
        }

        let (x, y) = (center.0 as f32, center.1 as f32);
        let h = MARKER_HALF_LENGTH;
        draw_line_segment_mut(canvas, (x - h, y), (x + h, y), OVERLAY_COLOR);
        draw_line_segment_mut(canvas, (x, y - h), (x, y + h), OVERLAY_COLOR);
    }

    /// Paints a filled disc, clipped to the canvas. Used to synthesize scenes.
    pub fn fill_disc(canvas: &mut RgbImage, center: (f64, f64), radius: f64, color: Rgb<u8>) {
        draw_filled_circle_mut(canvas, pixel(center), radius.round() as i32, color);
    }

    /// Saves an RGB frame as PNG.
    pub fn save_frame(path: &Path, frame: &RgbImage) -> Result<(), image::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);
        encoder.write_image(
            frame.as_raw(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(())
    }

    /// Saves a segmentation mask as PNG.
    pub fn save_mask(path: &Path, mask: &GrayImage) -> Result<(), image::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);
        encoder.write_image(
            mask.as_raw(),
            mask.width(),
            mask.height(),
            image::ExtendedColorType::L8,
        )?;
        Ok(())
    }
}
