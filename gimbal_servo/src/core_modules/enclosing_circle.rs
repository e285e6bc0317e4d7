// THEORY:
// Size estimation for a detected region. The radius reported for an object is
// the radius of the smallest circle that encloses all of its pixel centers.
//
// Running the circle search over every pixel would be wasteful; the minimal
// enclosing circle only ever touches points on the convex hull. A region's hull
// is contained in its per-row extremes (leftmost and rightmost pixel of every
// row), so the caller hands us those, imageproc reduces them to the hull, and we
// run the incremental Welzl construction over the hull. The point order is
// fixed, so the result is fully deterministic.

use imageproc::geometry::convex_hull;
use imageproc::point::Point;

const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: (f64, f64),
    pub radius: f64,
}

impl Circle {
    fn contains(&self, p: (f64, f64)) -> bool {
        distance(self.center, p) <= self.radius + EPSILON
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn collinear(points: &[Point<i32>]) -> bool {
    let (a, b) = (points[0], points[points.len() - 1]);
    points.iter().all(|p| {
        let lhs = (b.x - a.x) as i64 * (p.y - a.y) as i64;
        let rhs = (b.y - a.y) as i64 * (p.x - a.x) as i64;
        lhs == rhs
    })
}

/// Hull of a set of pixel centers. Sets without an interior are returned
/// deduplicated as they are.
pub fn pixel_hull(points: &[Point<i32>]) -> Vec<(f64, f64)> {
    let mut unique = points.to_vec();
    unique.sort_by_key(|p| (p.x, p.y));
    unique.dedup();

    let hull = if unique.len() < 3 || collinear(&unique) {
        unique
    } else {
        convex_hull(unique.as_slice())
    };
    hull.into_iter().map(|p| (p.x as f64, p.y as f64)).collect()
}

fn circle_from_two(a: (f64, f64), b: (f64, f64)) -> Circle {
    let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    Circle {
        center,
        radius: distance(a, b) / 2.0,
    }
}

fn circle_from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Circle {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < EPSILON {
        // Collinear: the widest pair spans the circle.
        let candidates = [circle_from_two(a, b), circle_from_two(a, c), circle_from_two(b, c)];
        return candidates.into_iter().fold(candidates[0], |best, circle| {
            if circle.radius > best.radius {
                circle
            } else {
                best
            }
        });
    }

    let a_sq = a.0 * a.0 + a.1 * a.1;
    let b_sq = b.0 * b.0 + b.1 * b.1;
    let c_sq = c.0 * c.0 + c.1 * c.1;
    let ux = (a_sq * (b.1 - c.1) + b_sq * (c.1 - a.1) + c_sq * (a.1 - b.1)) / d;
    let uy = (a_sq * (c.0 - b.0) + b_sq * (a.0 - c.0) + c_sq * (b.0 - a.0)) / d;
    let center = (ux, uy);
    Circle {
        center,
        radius: distance(center, a),
    }
}

/// Minimal enclosing circle of a set of pixel centers. `None` for an empty set.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Option<Circle> {
    let hull = pixel_hull(points);
    let first = *hull.first()?;

    let mut circle = Circle {
        center: first,
        radius: 0.0,
    };

    for i in 1..hull.len() {
        if circle.contains(hull[i]) {
            continue;
        }
        circle = Circle {
            center: hull[i],
            radius: 0.0,
        };
        for j in 0..i {
            if circle.contains(hull[j]) {
                continue;
            }
            circle = circle_from_two(hull[i], hull[j]);
            for k in 0..j {
                if !circle.contains(hull[k]) {
                    circle = circle_from_three(hull[i], hull[j], hull[k]);
                }
            }
        }
    }

    Some(circle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(coords: &[(i32, i32)]) -> Vec<Point<i32>> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn empty_set_has_no_circle() {
        assert!(min_enclosing_circle(&[]).is_none());
    }

    #[test]
    fn single_point_has_zero_radius() {
        let circle = min_enclosing_circle(&points(&[(3, 4)])).unwrap();
        assert_eq!(circle.center, (3.0, 4.0));
        assert_eq!(circle.radius, 0.0);
    }

    #[test]
    fn two_points_span_a_diameter() {
        let circle = min_enclosing_circle(&points(&[(0, 0), (6, 0)])).unwrap();
        assert!((circle.radius - 3.0).abs() < 1e-9);
        assert!((circle.center.0 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_pixels_span_their_extremes() {
        let column: Vec<(i32, i32)> = (0..9).map(|y| (5, y)).collect();
        let circle = min_enclosing_circle(&points(&column)).unwrap();
        assert!((circle.radius - 4.0).abs() < 1e-9);
        assert!((circle.center.1 - 4.0).abs() < 1e-9);
    }

    #[test]
    fn square_corners_use_the_diagonal() {
        let pts = points(&[(0, 0), (4, 0), (0, 4), (4, 4), (2, 2)]);
        let circle = min_enclosing_circle(&pts).unwrap();
        assert!((circle.radius - 8f64.sqrt()).abs() < 1e-9);
        assert!((circle.center.0 - 2.0).abs() < 1e-9);
        assert!((circle.center.1 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn every_input_point_is_enclosed() {
        let pts: Vec<Point<i32>> = (0..40)
            .map(|i| {
                let t = i as f64 * 0.37;
                let x = 10.0 + 7.0 * t.cos() + (i % 3) as f64;
                let y = 5.0 + 4.0 * t.sin();
                Point::new(x.round() as i32, y.round() as i32)
            })
            .collect();
        let circle = min_enclosing_circle(&pts).unwrap();
        for p in pts {
            assert!(circle.contains((p.x as f64, p.y as f64)));
        }
    }

    #[test]
    fn hull_drops_interior_and_repeated_points() {
        let pts = points(&[(0, 0), (2, 0), (2, 2), (0, 2), (1, 1), (2, 2)]);
        let hull = pixel_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&(1.0, 1.0)));
    }
}
