// THEORY:
// Image-directory frame source and PNG-directory display.

use crate::runner::FrameSource;
use anyhow::{Context, bail};
use gimbal_servo::core_modules::image_helper::image_helper;
use gimbal_servo::{DisplayError, FrameDisplay};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::info;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Replays a directory of still images in file-name order.
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    next: usize,
    resolution: (u32, u32),
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        let Some(first) = paths.first() else {
            bail!("no images found in {}", dir.display());
        };
        // The first image fixes the expected resolution; later mismatches are dropped by the loop.
        let resolution = image::image_dimensions(first)
            .with_context(|| format!("reading {}", first.display()))?;
        info!(
            count = paths.len(),
            width = resolution.0,
            height = resolution.1,
            "image source ready"
        );

        Ok(Self {
            paths,
            next: 0,
            resolution,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let frame = image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .to_rgb8();
        Ok(Some(frame))
    }
}

/// Writes each shown frame to `frame_00000.png`, `frame_00001.png`, ...
pub struct PngDirDisplay {
    dir: PathBuf,
    written: u64,
}

impl PngDirDisplay {
    pub fn create(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }
}

impl FrameDisplay for PngDirDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        let path = self.dir.join(format!("frame_{:05}.png", self.written));
        image_helper::save_frame(&path, frame).map_err(|e| DisplayError::Backend(e.to_string()))?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("servo_tester_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn replays_images_in_name_order() {
        let dir = scratch("source");
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(8, 6, Rgb([shade, 0, 0])).save(dir.join(name)).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut source = ImageDirSource::open(&dir).unwrap();
        assert_eq!(source.resolution(), (8, 6));
        let shades: Vec<u8> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|frame| frame.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 30]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = scratch("empty");
        assert!(ImageDirSource::open(&dir).is_err());
    }

    #[test]
    fn display_numbers_output_files() {
        let dir = scratch("display");
        let mut display = PngDirDisplay::create(&dir).unwrap();
        let frame = RgbImage::new(4, 4);
        display.show(&frame).unwrap();
        display.show(&frame).unwrap();
        assert!(dir.join("frame_00000.png").exists());
        assert!(dir.join("frame_00001.png").exists());
    }
}
