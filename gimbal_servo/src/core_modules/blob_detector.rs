// THEORY:
// The `BlobDetector` is the engine of the Spatial Grouping Layer. It takes the
// binary mask produced by the color segmenter and decides which part of it is
// "the object."
//
// Key architectural principles & algorithm steps:
// 1.  **Seeding**: The mask is scanned in row-major order (top-to-bottom,
//     left-to-right). Every foreground pixel not yet claimed by a region seeds a
//     new one.
// 2.  **Region Growing**: From each seed, the region grows over all 8 neighbors
//     with an explicit stack, so large objects cannot blow the call stack.
// 3.  **Selection**: Only the largest region matters to the servo. A later region
//     replaces the current best only when it is strictly larger, so ties go to
//     the region whose seed comes first in scan order. The result is
//     deterministic for a given mask.
// 4.  **Data Aggregation**: The winner is summarized as a `DetectedObject`:
//     centroid (mean pixel coordinate), area, bounding box, and the radius of its
//     minimal enclosing circle.
// 5.  **Stateless Utility**: `find_largest_object` has no memory of previous
//     frames. An empty mask yields `None`.

use crate::core_modules::color_segmenter::FOREGROUND;
use crate::core_modules::detected_object::{DetectedObject, Point};
use crate::core_modules::enclosing_circle::min_enclosing_circle;
use image::GrayImage;
use imageproc::point::Point as PixelPoint;

pub mod blob_detector {
    use super::*;

    /// Pixels of one connected region plus the per-row extremes its hull lives on.
    struct Region {
        area: usize,
        sum_x: u64,
        sum_y: u64,
        min: Point,
        max: Point,
        /// (row, leftmost x, rightmost x)
        row_extremes: Vec<(u32, u32, u32)>,
    }

    /// Finds the largest 8-connected foreground region of the mask.
    pub fn find_largest_object(mask: &GrayImage) -> Option<DetectedObject> {
        let (width, height) = mask.dimensions();
        let mut visited = vec![false; width as usize * height as usize];
        let mut best: Option<Region> = None;

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if visited[index] || mask.get_pixel(x, y).0[0] != FOREGROUND {
                    continue;
                }

                let region = grow_region(Point { x, y }, mask, &mut visited);
                let replace = match &best {
                    Some(current) => region.area > current.area,
                    None => true,
                };
                if replace {
                    best = Some(region);
                }
            }
        }

        best.map(summarize)
    }

    /// Depth-first flood fill over the 8-neighborhood.
    fn grow_region(seed: Point, mask: &GrayImage, visited: &mut [bool]) -> Region {
        let (width, height) = mask.dimensions();
        let mut stack: Vec<Point> = vec![seed];
        visited[(seed.y * width + seed.x) as usize] = true;

        let mut region = Region {
            area: 0,
            sum_x: 0,
            sum_y: 0,
            min: seed,
            max: seed,
            row_extremes: Vec::new(),
        };
        // Row extremes indexed relative to the seed row; the fill never goes above it.
        let mut rows: Vec<Option<(u32, u32)>> = Vec::new();

        while let Some(current) = stack.pop() {
            region.area += 1;
            region.sum_x += current.x as u64;
            region.sum_y += current.y as u64;
            region.min.x = region.min.x.min(current.x);
            region.min.y = region.min.y.min(current.y);
            region.max.x = region.max.x.max(current.x);
            region.max.y = region.max.y.max(current.y);

            let row = (current.y - seed.y) as usize;
            if rows.len() <= row {
                rows.resize(row + 1, None);
            }
            rows[row] = Some(match rows[row] {
                Some((left, right)) => (left.min(current.x), right.max(current.x)),
                None => (current.x, current.x),
            });

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = current.x as i64 + dx;
                    let ny = current.y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }

                    let (nx, ny) = (nx as u32, ny as u32);
                    let index = (ny * width + nx) as usize;
                    if !visited[index] && mask.get_pixel(nx, ny).0[0] == FOREGROUND {
                        visited[index] = true;
                        stack.push(Point { x: nx, y: ny });
                    }
                }
            }
        }

        region.row_extremes = rows
            .into_iter()
            .enumerate()
            .filter_map(|(offset, extremes)| {
                extremes.map(|(left, right)| (seed.y + offset as u32, left, right))
            })
            .collect();
        region
    }

    fn summarize(region: Region) -> DetectedObject {
        let hull_candidates: Vec<PixelPoint<i32>> = region
            .row_extremes
            .iter()
            .flat_map(|&(y, left, right)| {
                [PixelPoint::new(left as i32, y as i32), PixelPoint::new(right as i32, y as i32)]
            })
            .collect();
        let radius = min_enclosing_circle(&hull_candidates)
            .map(|circle| circle.radius)
            .unwrap_or(0.0);

        let area = region.area as f64;
        DetectedObject {
            centroid: (region.sum_x as f64 / area, region.sum_y as f64 / area),
            radius,
            area: region.area,
            bounding_box: (region.min, region.max),
        }
    }
}
