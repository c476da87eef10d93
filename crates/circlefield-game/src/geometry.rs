//! Shape intersection tests.
//!
//! Pure functions, no state. Every test is symmetric and inclusive:
//! shapes that merely touch (distance equal to the radius sum, or a shared
//! edge or corner) count as intersecting, which decides the exact tick on
//! which a growing circle is eliminated.

use glam::DVec2;

/// A circle: centre and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: DVec2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: DVec2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// `true` if any part of the circle lies outside `[0, width] × [0, height]`.
    /// Touching an edge is still inside.
    pub fn exceeds_bounds(&self, width: f64, height: f64) -> bool {
        let Circle { center, radius } = *self;
        center.x - radius < 0.0
            || center.x + radius > width
            || center.y - radius < 0.0
            || center.y + radius > height
    }
}

/// A convex polygon given by its vertices in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<DVec2>,
}

impl Polygon {
    pub fn new(vertices: Vec<DVec2>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned rectangle with its top-left corner at `origin`.
    pub fn rect(origin: DVec2, size: DVec2) -> Self {
        Self::new(vec![
            origin,
            DVec2::new(origin.x + size.x, origin.y),
            origin + size,
            DVec2::new(origin.x, origin.y + size.y),
        ])
    }

    /// Fewer than three vertices encloses nothing.
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Unit normals of every non-zero edge.
    fn edge_normals(&self) -> impl Iterator<Item = DVec2> + '_ {
        let n = self.vertices.len();
        (0..n).filter_map(move |i| {
            let edge = self.vertices[(i + 1) % n] - self.vertices[i];
            let normal = edge.perp().normalize_or_zero();
            (normal != DVec2::ZERO).then_some(normal)
        })
    }

    fn project(&self, axis: DVec2) -> (f64, f64) {
        self.vertices
            .iter()
            .map(|v| v.dot(axis))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p), hi.max(p))
            })
    }

    fn closest_vertex(&self, point: DVec2) -> Option<DVec2> {
        self.vertices.iter().copied().min_by(|a, b| {
            a.distance_squared(point)
                .total_cmp(&b.distance_squared(point))
        })
    }
}

fn overlaps((a_lo, a_hi): (f64, f64), (b_lo, b_hi): (f64, f64)) -> bool {
    a_lo <= b_hi && b_lo <= a_hi
}

/// Circle–circle test: centre distance ≤ sum of radii.
pub fn circle_intersects_circle(a: &Circle, b: &Circle) -> bool {
    let reach = a.radius + b.radius;
    a.center.distance_squared(b.center) <= reach * reach
}

/// Circle–convex-polygon separating-axis test.
///
/// Candidate axes are the polygon's edge normals plus the direction from
/// the circle centre to the polygon's nearest vertex.
pub fn circle_intersects_polygon(circle: &Circle, polygon: &Polygon) -> bool {
    if polygon.is_degenerate() {
        return false;
    }
    let Some(nearest) = polygon.closest_vertex(circle.center) else {
        return false;
    };
    let to_vertex = (nearest - circle.center).normalize_or_zero();
    if to_vertex == DVec2::ZERO {
        // centre sits exactly on a vertex
        return true;
    }

    polygon
        .edge_normals()
        .chain(std::iter::once(to_vertex))
        .all(|axis| {
            let c = circle.center.dot(axis);
            overlaps(polygon.project(axis), (c - circle.radius, c + circle.radius))
        })
}

/// Convex-polygon separating-axis test over the edge normals of both.
pub fn polygon_intersects_polygon(a: &Polygon, b: &Polygon) -> bool {
    if a.is_degenerate() || b.is_degenerate() {
        return false;
    }
    a.edge_normals()
        .chain(b.edge_normals())
        .all(|axis| overlaps(a.project(axis), b.project(axis)))
}
