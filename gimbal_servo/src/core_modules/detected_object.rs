// THEORY:
// The `DetectedObject` is the output of the spatial layer for a single frame: the
// one region of the mask the servo should chase. It is a "dumb" data container,
// just like a blob in any other frame-by-frame detector. It carries no identity
// and no memory of earlier frames; the only state that crosses frames lives in
// the PID controllers.
//
// "Nothing found" is modeled as `Option::None`, never as an error. An empty scene
// is an everyday outcome for a tracker.

/// A pixel coordinate on the mask grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// The largest in-range region of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    /// Mean pixel coordinate of the region, in `[0, W) x [0, H)`.
    pub centroid: (f64, f64),
    /// Radius of the minimal circle enclosing every pixel center of the region.
    pub radius: f64,
    /// Number of pixels in the region.
    pub area: usize,
    /// Top-left and bottom-right corners of the region.
    pub bounding_box: (Point, Point),
}
