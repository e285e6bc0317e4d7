// THEORY:
// OpenCV video source and highgui window.

use crate::runner::FrameSource;
use anyhow::{Context, bail};
use gimbal_servo::{DisplayError, FrameDisplay, QuitSignal};
use image::RgbImage;
use opencv::{
    core::{self, Mat, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::time::Duration;
use tracing::{info, warn};

const KEY_ESC: i32 = 27;
const KEY_Q: i32 = 'q' as i32;

/// A video file or camera. A numeric input selects a camera index.
pub struct VideoSource {
    capture: VideoCapture,
    resolution: (u32, u32),
    frame_interval: Option<Duration>,
    frame: Mat,
    rgb: Mat,
}

impl VideoSource {
    pub fn open(input: &str) -> anyhow::Result<Self> {
        let (capture, is_file) = match input.parse::<i32>() {
            Ok(index) => (VideoCapture::new(index, videoio::CAP_ANY)?, false),
            Err(_) => (VideoCapture::from_file(input, videoio::CAP_ANY)?, true),
        };
        if !capture.is_opened()? {
            bail!("could not open video input {input}");
        }

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        // Files play back at their native rate; cameras pace themselves.
        let frame_interval = (is_file && fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));
        info!(width, height, fps, "video source ready");

        Ok(Self {
            capture,
            resolution: (width, height),
            frame_interval,
            frame: Mat::default(),
            rgb: Mat::default(),
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        if !self.capture.read(&mut self.frame)? || self.frame.empty() {
            return Ok(None);
        }
        imgproc::cvt_color(&self.frame, &mut self.rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let (cols, rows) = (self.rgb.cols() as u32, self.rgb.rows() as u32);
        let bytes = self.rgb.data_bytes()?.to_vec();
        let image = RgbImage::from_raw(cols, rows, bytes)
            .context("decoded frame has an unexpected layout")?;
        Ok(Some(image))
    }

    fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }
}

/// A highgui window. Must stay on the thread that created it.
pub struct WindowDisplay {
    name: String,
    quit: QuitSignal,
    rgb: Mat,
    bgr: Mat,
}

impl WindowDisplay {
    /// Opens a window at half the frame resolution. Pressing `q` or Esc in
    /// the window fires `quit`.
    pub fn new(name: &str, resolution: (u32, u32), quit: QuitSignal) -> anyhow::Result<Self> {
        highgui::named_window(name, highgui::WINDOW_NORMAL)?;
        highgui::resize_window(name, (resolution.0 / 2) as i32, (resolution.1 / 2) as i32)?;
        Ok(Self {
            name: name.to_string(),
            quit,
            rgb: Mat::default(),
            bgr: Mat::default(),
        })
    }

    fn to_bgr(&mut self, frame: &RgbImage) -> opencv::Result<()> {
        let (width, height) = frame.dimensions();
        if self.rgb.cols() != width as i32 || self.rgb.rows() != height as i32 {
            self.rgb = Mat::new_rows_cols_with_default(
                height as i32,
                width as i32,
                core::CV_8UC3,
                Scalar::all(0.0),
            )?;
        }
        self.rgb.data_bytes_mut()?.copy_from_slice(frame.as_raw());
        imgproc::cvt_color(&self.rgb, &mut self.bgr, imgproc::COLOR_RGB2BGR, 0)
    }
}

fn backend(e: opencv::Error) -> DisplayError {
    DisplayError::Backend(e.to_string())
}

impl FrameDisplay for WindowDisplay {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        self.to_bgr(frame).map_err(backend)?;
        highgui::imshow(&self.name, &self.bgr).map_err(backend)
    }

    fn pump_events(&mut self) -> Result<(), DisplayError> {
        let key = highgui::wait_key(1).map_err(backend)?;
        if (key == KEY_Q || key == KEY_ESC) && self.quit.fire() {
            info!("quit requested from window");
        }
        Ok(())
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.name) {
            warn!("failed to close window: {e}");
        }
    }
}
