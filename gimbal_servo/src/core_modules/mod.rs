pub mod blob_detector;
pub mod color_range;
pub mod color_segmenter;
pub mod detected_object;
pub mod enclosing_circle;
pub mod error_normalizer;
pub mod frame;
pub mod hsv_pixel;
pub mod image_helper;
pub mod pid;
