// THEORY:
// The error normalizer turns "where is the object on screen" into "how far off
// center is it", independently of the camera resolution. Both components are
// fractions of the frame size, so the same PID gains work for any resolution.
//
// Screen coordinates grow downwards; control coordinates grow upwards. The Y
// component is flipped here so a positive errY always means "the object is above
// center".

/// Off-center error of a detection, each component in `[-0.5, 0.5]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedError {
    pub x: f64,
    pub y: f64,
}

impl NormalizedError {
    /// True when both components are within `deadband` of zero. A deadband of
    /// 0.0 only matches an exactly centered object.
    pub fn within(&self, deadband: f64) -> bool {
        self.x.abs() <= deadband && self.y.abs() <= deadband
    }
}

/// errX = (x - W/2) / W, errY = (H/2 - y) / H
pub fn normalize(centroid: (f64, f64), width: u32, height: u32) -> NormalizedError {
    let (w, h) = (width as f64, height as f64);
    NormalizedError {
        x: (centroid.0 - w / 2.0) / w,
        y: (h / 2.0 - centroid.1) / h,
    }
}
