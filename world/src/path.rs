//! Seeded path construction and arc-length queries.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use darknet_defence_core::{PathShape, PATH_HALF_WIDTH};

const BEZIER_SAMPLES_PER_SEGMENT: u32 = 10;
const DEFAULT_CONTROL_POINTS: usize = 6;
const SPIRAL_TURNS: f32 = 2.0;
const SPIRAL_STEP_RADIANS: f32 = 0.3;
const SPIRAL_INNER_RADIUS: f32 = 30.0;
const ZIGZAG_COLUMNS: u32 = 8;
const MIN_SEGMENT_LENGTH: f32 = 0.5;

/// Immutable polyline every enemy of a campaign follows.
///
/// Built once per game from the campaign seed; all queries are pure. Arc
/// lengths are precomputed so progress lookups stay O(log n).
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PathPlan {
    points: Vec<Vec2>,
    cumulative: Vec<f32>,
    total_length: f32,
}

impl PathPlan {
    /// Generates the path for the provided seed, shape, and field size.
    pub(crate) fn generate(seed: u64, shape: PathShape, width: f32, height: f32) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let raw = match shape {
            PathShape::Default => default_shape(&mut rng, width, height),
            PathShape::Spiral => spiral_shape(width, height),
            PathShape::Zigzag => zigzag_shape(&mut rng, width, height),
            PathShape::Loop => loop_shape(width, height),
            PathShape::Cross => cross_shape(width, height),
        };
        Self::from_points(raw, width, height)
    }

    fn from_points(raw: Vec<Vec2>, width: f32, height: f32) -> Self {
        let mut points: Vec<Vec2> = Vec::with_capacity(raw.len());
        for point in raw {
            match points.last() {
                Some(last) if last.distance(point) < MIN_SEGMENT_LENGTH => {}
                _ => points.push(point),
            }
        }

        if points.len() < 2 {
            points = fallback_line(width, height);
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0f32;
        cumulative.push(0.0);
        for window in points.windows(2) {
            total += window[0].distance(window[1]);
            cumulative.push(total);
        }

        if total <= f32::EPSILON {
            points = fallback_line(width, height);
            let span = points[0].distance(points[1]);
            cumulative = vec![0.0, span];
            total = span;
        }

        Self {
            points,
            cumulative,
            total_length: total,
        }
    }

    /// Ordered waypoints of the path.
    pub(crate) fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Position and tangent angle at the provided progress fraction.
    pub(crate) fn position_at(&self, progress: f32) -> (Vec2, f32) {
        let clamped = progress.clamp(0.0, 1.0);
        let target = clamped * self.total_length;

        let segment = match self
            .cumulative
            .binary_search_by(|length| length.partial_cmp(&target).expect("finite arc length"))
        {
            Ok(index) => index.min(self.points.len() - 2),
            Err(index) => index.saturating_sub(1).min(self.points.len() - 2),
        };

        let start = self.points[segment];
        let end = self.points[segment + 1];
        let span = self.cumulative[segment + 1] - self.cumulative[segment];
        let t = if span <= f32::EPSILON {
            0.0
        } else {
            (target - self.cumulative[segment]) / span
        };

        let direction = end - start;
        (start + direction * t, direction.y.atan2(direction.x))
    }

    /// Progress fraction of a walker that still has to reach `waypoint` and
    /// currently stands at `position`.
    pub(crate) fn progress_toward(&self, waypoint: usize, position: Vec2) -> f32 {
        let index = waypoint.min(self.points.len() - 1);
        let covered = self.cumulative[index] - position.distance(self.points[index]);
        (covered / self.total_length).clamp(0.0, 1.0)
    }

    /// Waypoint index an enemy dropped at `progress` should walk toward next.
    pub(crate) fn waypoint_after(&self, progress: f32) -> usize {
        let target = progress.clamp(0.0, 1.0) * self.total_length;
        for (index, length) in self.cumulative.iter().enumerate() {
            if *length > target {
                return index;
            }
        }
        self.points.len() - 1
    }

    /// Minimum perpendicular distance from the point to any path segment.
    pub(crate) fn distance_to_path(&self, point: Vec2) -> f32 {
        let mut best = f32::MAX;
        for window in self.points.windows(2) {
            best = best.min(distance_to_segment(point, window[0], window[1]));
        }
        best
    }

    /// Reports whether the point lies within the path corridor.
    pub(crate) fn is_on_path(&self, point: Vec2) -> bool {
        self.distance_to_path(point) <= PATH_HALF_WIDTH
    }
}

fn fallback_line(width: f32, height: f32) -> Vec<Vec2> {
    vec![
        Vec2::new(0.0, height / 2.0),
        Vec2::new(width.max(1.0), height / 2.0),
    ]
}

fn distance_to_segment(point: Vec2, start: Vec2, end: Vec2) -> f32 {
    let span = end - start;
    let length_sq = span.length_squared();
    if length_sq <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(span) / length_sq).clamp(0.0, 1.0);
    point.distance(start + span * t)
}

fn default_shape(rng: &mut ChaCha8Rng, width: f32, height: f32) -> Vec<Vec2> {
    let mid = height / 2.0;
    let jitter = height * 0.25;
    let mut controls = Vec::with_capacity(DEFAULT_CONTROL_POINTS);
    for index in 0..DEFAULT_CONTROL_POINTS {
        let x = width * index as f32 / (DEFAULT_CONTROL_POINTS - 1) as f32;
        let y = if index == 0 || index == DEFAULT_CONTROL_POINTS - 1 {
            mid
        } else {
            mid + rng.gen_range(-jitter..=jitter)
        };
        controls.push(Vec2::new(x, y));
    }
    smooth_quadratic(&controls)
}

/// Quadratic interpolation through the control points, sampling each curve at
/// a fixed rate. Segment midpoints anchor the curves so the smoothed path
/// still passes near every control point.
fn smooth_quadratic(controls: &[Vec2]) -> Vec<Vec2> {
    if controls.len() < 3 {
        return controls.to_vec();
    }

    let mut points = vec![controls[0]];
    for index in 1..controls.len() - 1 {
        let entry = controls[index - 1].lerp(controls[index], 0.5);
        let exit = controls[index].lerp(controls[index + 1], 0.5);
        for sample in 1..=BEZIER_SAMPLES_PER_SEGMENT {
            let t = sample as f32 / BEZIER_SAMPLES_PER_SEGMENT as f32;
            points.push(quadratic_point(entry, controls[index], exit, t));
        }
    }
    points.push(controls[controls.len() - 1]);
    points
}

fn quadratic_point(start: Vec2, control: Vec2, end: Vec2, t: f32) -> Vec2 {
    let inverse = 1.0 - t;
    start * (inverse * inverse) + control * (2.0 * inverse * t) + end * (t * t)
}

fn spiral_shape(width: f32, height: f32) -> Vec<Vec2> {
    let center = Vec2::new(width / 2.0, height / 2.0);
    let outer = width.min(height) * 0.45;
    if outer <= SPIRAL_INNER_RADIUS {
        return fallback_line(width, height);
    }

    let total_angle = SPIRAL_TURNS * std::f32::consts::TAU;
    let steps = (total_angle / SPIRAL_STEP_RADIANS).ceil() as u32;
    let mut points = Vec::with_capacity(steps as usize + 1);
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let angle = std::f32::consts::PI + t * total_angle;
        let radius = outer - (outer - SPIRAL_INNER_RADIUS) * t;
        points.push(center + Vec2::new(angle.cos(), angle.sin()) * radius);
    }
    points
}

fn zigzag_shape(rng: &mut ChaCha8Rng, width: f32, height: f32) -> Vec<Vec2> {
    let high = height * 0.2;
    let low = height * 0.8;
    let sway = height * 0.05;
    let mut points = Vec::with_capacity(ZIGZAG_COLUMNS as usize + 1);
    points.push(Vec2::new(0.0, height / 2.0));
    for column in 1..ZIGZAG_COLUMNS {
        let x = width * column as f32 / ZIGZAG_COLUMNS as f32;
        let base = if column % 2 == 1 { high } else { low };
        points.push(Vec2::new(x, base + rng.gen_range(-sway..=sway)));
    }
    points.push(Vec2::new(width, height / 2.0));
    points
}

fn loop_shape(width: f32, height: f32) -> Vec<Vec2> {
    let mid = height / 2.0;
    let center = Vec2::new(width * 0.5, mid);
    let radius = height * 0.3;
    if radius <= MIN_SEGMENT_LENGTH {
        return fallback_line(width, height);
    }

    let mut points = vec![
        Vec2::new(0.0, mid),
        Vec2::new(width * 0.5 - radius, mid),
    ];
    let steps = 12u32;
    for step in 1..steps {
        let angle = std::f32::consts::PI + step as f32 / steps as f32 * std::f32::consts::TAU;
        points.push(center + Vec2::new(angle.cos(), angle.sin()) * radius);
    }
    points.push(Vec2::new(width * 0.5 - radius, mid));
    points.push(Vec2::new(width, mid));
    points
}

fn cross_shape(width: f32, height: f32) -> Vec<Vec2> {
    let mid = height / 2.0;
    vec![
        Vec2::new(0.0, mid),
        Vec2::new(width * 0.5, mid),
        Vec2::new(width * 0.5, height * 0.15),
        Vec2::new(width * 0.5, height * 0.85),
        Vec2::new(width * 0.5, mid),
        Vec2::new(width, mid),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: f32 = 800.0;
    const HEIGHT: f32 = 600.0;

    #[test]
    fn generation_is_deterministic_per_seed() {
        let first = PathPlan::generate(7, PathShape::Default, WIDTH, HEIGHT);
        let second = PathPlan::generate(7, PathShape::Default, WIDTH, HEIGHT);
        assert_eq!(first, second);
    }

    #[test]
    fn different_seeds_jitter_the_default_shape() {
        let first = PathPlan::generate(1, PathShape::Default, WIDTH, HEIGHT);
        let second = PathPlan::generate(2, PathShape::Default, WIDTH, HEIGHT);
        assert_ne!(first.points(), second.points());
    }

    #[test]
    fn every_shape_yields_a_walkable_polyline() {
        for shape in [
            PathShape::Default,
            PathShape::Spiral,
            PathShape::Zigzag,
            PathShape::Loop,
            PathShape::Cross,
        ] {
            let path = PathPlan::generate(42, shape, WIDTH, HEIGHT);
            assert!(path.points().len() >= 2, "{shape:?} produced too few points");
            assert!(path.total_length > 0.0);
            for window in path.points().windows(2) {
                assert!(
                    window[0].distance(window[1]) >= MIN_SEGMENT_LENGTH,
                    "{shape:?} produced a degenerate segment",
                );
            }
        }
    }

    #[test]
    fn endpoints_lie_on_the_path() {
        let path = PathPlan::generate(9, PathShape::Zigzag, WIDTH, HEIGHT);
        let first = path.points()[0];
        let last = *path.points().last().expect("non-empty path");
        assert!(path.is_on_path(first));
        assert!(path.is_on_path(last));
    }

    #[test]
    fn degenerate_field_falls_back_to_a_straight_line() {
        let path = PathPlan::generate(3, PathShape::Spiral, 10.0, 10.0);
        assert_eq!(path.points().len(), 2);
        assert_eq!(path.points()[0], Vec2::new(0.0, 5.0));
    }

    #[test]
    fn position_at_interpolates_along_arc_length() {
        let path = PathPlan::from_points(
            vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)],
            100.0,
            100.0,
        );
        let (start, _) = path.position_at(0.0);
        let (middle, angle) = path.position_at(0.5);
        let (end, _) = path.position_at(1.0);
        assert_eq!(start, Vec2::new(0.0, 0.0));
        assert_eq!(middle, Vec2::new(50.0, 0.0));
        assert_eq!(end, Vec2::new(100.0, 0.0));
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn distance_to_path_measures_perpendicular_offset() {
        let path = PathPlan::from_points(
            vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)],
            100.0,
            100.0,
        );
        assert_eq!(path.distance_to_path(Vec2::new(50.0, 30.0)), 30.0);
        assert!(path.is_on_path(Vec2::new(50.0, PATH_HALF_WIDTH)));
        assert!(!path.is_on_path(Vec2::new(50.0, PATH_HALF_WIDTH + 0.5)));
    }

    #[test]
    fn progress_toward_tracks_remaining_distance() {
        let path = PathPlan::from_points(
            vec![Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)],
            100.0,
            100.0,
        );
        let progress = path.progress_toward(1, Vec2::new(25.0, 0.0));
        assert!((progress - 0.25).abs() < 1e-5);
    }

    #[test]
    fn waypoint_after_teleport_lands_on_the_next_segment() {
        let path = PathPlan::from_points(
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(100.0, 0.0),
                Vec2::new(200.0, 0.0),
            ],
            200.0,
            100.0,
        );
        assert_eq!(path.waypoint_after(0.25), 1);
        assert_eq!(path.waypoint_after(0.75), 2);
        assert_eq!(path.waypoint_after(1.0), 2);
    }
}
