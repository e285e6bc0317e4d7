// THEORY:
// Closed-loop simulation.
//
// A virtual camera looks at a flat world containing a green target disc and a
// smaller green decoy. The simulated gimbal pans the camera's view by the
// commanded deflection, so every command shows up in the next rendered frame.

use crate::frames::PngDirDisplay;
use crate::runner::{self, FrameSource, HeadlessDisplay, RunOptions};
use gimbal_servo::core_modules::image_helper::image_helper;
use gimbal_servo::{
    ActuationCommand, ControlMode, GimbalTransport, LoopStats, TransportError, ValidatedConfig,
};
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

const BACKGROUND: Rgb<u8> = Rgb([30, 30, 60]);
const TARGET_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const DECOY_SCALE: f64 = 0.6;

#[derive(Debug, Clone, Copy)]
pub struct SceneSetup {
    pub width: u32,
    pub height: u32,
    /// Target position in the first frame.
    pub start: (f64, f64),
    pub radius: f64,
    pub frames: u64,
    pub frame_interval: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub struct SimOutcome {
    pub stats: LoopStats,
    pub dropped_frames: u64,
    /// Distance in pixels between the target and the frame center at the end.
    pub final_offset: f64,
}

/// World state shared by the camera and the gimbal.
#[derive(Debug)]
struct World {
    scene: SceneSetup,
    /// Top-left corner of the camera view, in world pixels.
    view: (f64, f64),
}

impl World {
    fn target(&self) -> (f64, f64) {
        (self.scene.start.0 - self.view.0, self.scene.start.1 - self.view.1)
    }

    fn decoy(&self) -> (f64, f64) {
        let (w, h) = (self.scene.width as f64, self.scene.height as f64);
        (self.scene.start.0 + w * 0.5 - self.view.0, self.scene.start.1 + h * 0.5 - self.view.1)
    }

    fn render(&self) -> RgbImage {
        let mut frame = RgbImage::from_pixel(self.scene.width, self.scene.height, BACKGROUND);
        let radius = self.scene.radius;
        image_helper::fill_disc(&mut frame, self.decoy(), radius * DECOY_SCALE, TARGET_COLOR);
        image_helper::fill_disc(&mut frame, self.target(), radius, TARGET_COLOR);
        frame
    }

    fn offset_from_center(&self) -> f64 {
        let (x, y) = self.target();
        let (cx, cy) = (self.scene.width as f64 / 2.0, self.scene.height as f64 / 2.0);
        ((x - cx).powi(2) + (y - cy).powi(2)).sqrt()
    }
}

type SharedWorld = Arc<Mutex<World>>;

fn lock(world: &SharedWorld) -> std::sync::MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Full deflection pans the view by one frame width (yaw) or height (pitch).
/// Positive pitch tilts the camera down, so the scene moves up.
struct SimGimbal {
    world: SharedWorld,
}

impl GimbalTransport for SimGimbal {
    fn send(&mut self, command: ActuationCommand, mode: ControlMode) -> Result<(), TransportError> {
        let mut world = lock(&self.world);
        let (w, h) = (world.scene.width as f64, world.scene.height as f64);
        world.view.0 += command.x * w;
        world.view.1 += command.y * h;
        debug!(?mode, view_x = world.view.0, view_y = world.view.1, "gimbal moved");
        Ok(())
    }
}

struct SimCamera {
    world: SharedWorld,
    remaining: u64,
}

impl FrameSource for SimCamera {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(lock(&self.world).render()))
    }

    fn frame_interval(&self) -> Option<Duration> {
        lock(&self.world).scene.frame_interval
    }
}

pub fn run(
    config: &ValidatedConfig,
    scene: SceneSetup,
    out: Option<&Path>,
    options: RunOptions,
) -> anyhow::Result<SimOutcome> {
    let world = Arc::new(Mutex::new(World { scene, view: (0.0, 0.0) }));
    let camera = SimCamera {
        world: Arc::clone(&world),
        remaining: scene.frames,
    };
    let gimbal = SimGimbal {
        world: Arc::clone(&world),
    };

    let outcome = match out {
        Some(dir) => runner::run(config, PngDirDisplay::create(dir)?, camera, gimbal, options)?,
        None => runner::run(config, HeadlessDisplay::default(), camera, gimbal, options)?,
    };

    Ok(SimOutcome {
        stats: outcome.stats,
        dropped_frames: outcome.dropped_frames,
        final_offset: lock(&world).offset_from_center(),
    })
}
