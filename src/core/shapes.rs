use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::{DEFAULT_VERTEX_RADIUS, MAX_SHAPE_VERTICES};
use crate::core::types::MassData;
use crate::utils::math::cross;

/// Collision filtering data carried by every shape.
///
/// Two shapes may collide when their category/mask bits cross-match, unless
/// a shared non-zero group index forces the decision: positive groups always
/// collide, negative groups never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub category: u16,
    pub mask: u16,
    pub group: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category: 0x0001,
            mask: 0xFFFF,
            group: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group == other.group && self.group != 0 {
            return self.group > 0;
        }
        (self.category & other.mask) != 0 && (other.category & self.mask) != 0
    }
}

/// Convex distance proxy: a rounded point cloud used by GJK, the TOI root
/// finder, and manifold generation.
///
/// Vertices are ordered counter-clockwise; `normals[i]` is the outward
/// normal of the edge from `vertices[i]` to `vertices[i + 1]` (polygon-like
/// proxies only).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistanceProxy {
    pub vertex_radius: f32,
    pub vertices: SmallVec<[Vec2; MAX_SHAPE_VERTICES]>,
    pub normals: SmallVec<[Vec2; MAX_SHAPE_VERTICES]>,
}

impl DistanceProxy {
    pub fn new(
        vertex_radius: f32,
        vertices: impl IntoIterator<Item = Vec2>,
        normals: impl IntoIterator<Item = Vec2>,
    ) -> Self {
        Self {
            vertex_radius,
            vertices: vertices.into_iter().collect(),
            normals: normals.into_iter().collect(),
        }
    }

    pub fn count(&self) -> usize {
        self.vertices.len()
    }

    /// Index of the vertex most extreme in direction `d`, lowest index on ties.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best = 0;
        let mut best_dot = f32::NEG_INFINITY;
        for (i, v) in self.vertices.iter().enumerate() {
            let dot = v.dot(d);
            if dot > best_dot {
                best_dot = dot;
                best = i;
            }
        }
        best
    }
}

/// Solid disk centered at a local point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub radius: f32,
    pub center: Vec2,
}

impl Disk {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            center: Vec2::ZERO,
        }
    }

    pub fn at(radius: f32, center: Vec2) -> Self {
        Self { radius, center }
    }
}

/// Line segment with a vertex radius, collidable from both sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub v1: Vec2,
    pub v2: Vec2,
    pub vertex_radius: f32,
}

impl Edge {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self {
            v1,
            v2,
            vertex_radius: DEFAULT_VERTEX_RADIUS,
        }
    }
}

/// Convex polygon with outward edge normals, counter-clockwise winding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: SmallVec<[Vec2; MAX_SHAPE_VERTICES]>,
    normals: SmallVec<[Vec2; MAX_SHAPE_VERTICES]>,
    centroid: Vec2,
    pub vertex_radius: f32,
}

impl Polygon {
    /// Builds a polygon from counter-clockwise convex vertices.
    ///
    /// The caller is responsible for convexity and winding; the world's
    /// shape-creation entry point rejects degenerate inputs.
    pub fn new(points: &[Vec2]) -> Self {
        let vertices: SmallVec<[Vec2; MAX_SHAPE_VERTICES]> = points.iter().copied().collect();
        let n = vertices.len();
        let mut normals = SmallVec::new();
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            normals.push(Vec2::new(edge.y, -edge.x).normalize_or_zero());
        }
        let centroid = polygon_centroid(&vertices);
        Self {
            vertices,
            normals,
            centroid,
            vertex_radius: DEFAULT_VERTEX_RADIUS,
        }
    }

    /// Axis-aligned box with the given half extents, centered at the origin.
    pub fn rect(half_width: f32, half_height: f32) -> Self {
        Self::new(&[
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ])
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Twice the signed area; positive for counter-clockwise winding.
    pub fn signed_area2(&self) -> f32 {
        let n = self.vertices.len();
        let mut acc = 0.0;
        for i in 0..n {
            acc += cross(self.vertices[i], self.vertices[(i + 1) % n]);
        }
        acc
    }
}

fn polygon_centroid(vertices: &[Vec2]) -> Vec2 {
    let mut c = Vec2::ZERO;
    let mut area = 0.0;
    let reference = vertices[0];
    for i in 1..vertices.len() - 1 {
        let e1 = vertices[i] - reference;
        let e2 = vertices[i + 1] - reference;
        let a = 0.5 * cross(e1, e2);
        area += a;
        c += a * (e1 + e2) / 3.0;
    }
    if area.abs() > f32::EPSILON {
        reference + c / area
    } else {
        reference
    }
}

/// Open polyline whose children are its segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub vertices: Vec<Vec2>,
    pub vertex_radius: f32,
}

impl Chain {
    pub fn new(vertices: Vec<Vec2>) -> Self {
        Self {
            vertices,
            vertex_radius: DEFAULT_VERTEX_RADIUS,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }
}

/// Geometric payload of a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeGeometry {
    Disk(Disk),
    Edge(Edge),
    Polygon(Polygon),
    Chain(Chain),
}

/// Value-typed shape: geometry plus the surface and filtering properties
/// shared by every body that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub geometry: ShapeGeometry,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub is_sensor: bool,
    pub filter: Filter,
}

impl Shape {
    pub fn new(geometry: ShapeGeometry) -> Self {
        Self {
            geometry,
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }

    pub fn disk(radius: f32) -> Self {
        Self::new(ShapeGeometry::Disk(Disk::new(radius)))
    }

    pub fn rect(half_width: f32, half_height: f32) -> Self {
        Self::new(ShapeGeometry::Polygon(Polygon::rect(half_width, half_height)))
    }

    pub fn edge(v1: Vec2, v2: Vec2) -> Self {
        Self::new(ShapeGeometry::Edge(Edge::new(v1, v2)))
    }

    pub fn density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Number of broad-phase children this shape contributes.
    pub fn child_count(&self) -> usize {
        match &self.geometry {
            ShapeGeometry::Disk(_) | ShapeGeometry::Edge(_) | ShapeGeometry::Polygon(_) => 1,
            ShapeGeometry::Chain(chain) => chain.segment_count(),
        }
    }

    /// Distance proxy for child `index`.
    ///
    /// Returns `None` for an out-of-range child index.
    pub fn child(&self, index: usize) -> Option<DistanceProxy> {
        match &self.geometry {
            ShapeGeometry::Disk(disk) => (index == 0).then(|| {
                DistanceProxy::new(disk.radius, [disk.center], std::iter::empty())
            }),
            ShapeGeometry::Edge(edge) => (index == 0).then(|| {
                let normal = edge_normal(edge.v1, edge.v2);
                DistanceProxy::new(edge.vertex_radius, [edge.v1, edge.v2], [normal, -normal])
            }),
            ShapeGeometry::Polygon(poly) => (index == 0).then(|| {
                DistanceProxy::new(
                    poly.vertex_radius,
                    poly.vertices.iter().copied(),
                    poly.normals.iter().copied(),
                )
            }),
            ShapeGeometry::Chain(chain) => {
                if index < chain.segment_count() {
                    let v1 = chain.vertices[index];
                    let v2 = chain.vertices[index + 1];
                    let normal = edge_normal(v1, v2);
                    Some(DistanceProxy::new(
                        chain.vertex_radius,
                        [v1, v2],
                        [normal, -normal],
                    ))
                } else {
                    None
                }
            }
        }
    }

    /// Vertex radius of the shape's children; uniform per shape.
    pub fn vertex_radius(&self, _child_index: usize) -> f32 {
        match &self.geometry {
            ShapeGeometry::Disk(disk) => disk.radius,
            ShapeGeometry::Edge(edge) => edge.vertex_radius,
            ShapeGeometry::Polygon(poly) => poly.vertex_radius,
            ShapeGeometry::Chain(chain) => chain.vertex_radius,
        }
    }

    /// Mass properties of the shape at its configured density.
    pub fn mass_data(&self) -> MassData {
        match &self.geometry {
            ShapeGeometry::Disk(disk) => {
                let mass = self.density * std::f32::consts::PI * disk.radius * disk.radius;
                let inertia =
                    mass * (0.5 * disk.radius * disk.radius + disk.center.length_squared());
                MassData::new(mass, inertia, disk.center)
            }
            ShapeGeometry::Edge(edge) => {
                // Segments are massless; they anchor static geometry.
                MassData::new(0.0, 0.0, 0.5 * (edge.v1 + edge.v2))
            }
            ShapeGeometry::Chain(chain) => {
                let center = if chain.vertices.is_empty() {
                    Vec2::ZERO
                } else {
                    chain.vertices.iter().copied().sum::<Vec2>() / chain.vertices.len() as f32
                };
                MassData::new(0.0, 0.0, center)
            }
            ShapeGeometry::Polygon(poly) => polygon_mass_data(poly, self.density),
        }
    }

    /// Validation used at shape-creation time.
    pub fn is_degenerate(&self) -> bool {
        match &self.geometry {
            ShapeGeometry::Disk(disk) => !(disk.radius > 0.0),
            ShapeGeometry::Edge(edge) => edge.v1.distance_squared(edge.v2) <= f32::EPSILON,
            ShapeGeometry::Polygon(poly) => {
                poly.vertices().len() < 3
                    || poly.vertices().len() > MAX_SHAPE_VERTICES
                    || poly.signed_area2() <= f32::EPSILON
            }
            ShapeGeometry::Chain(chain) => chain.segment_count() == 0,
        }
    }
}

fn edge_normal(v1: Vec2, v2: Vec2) -> Vec2 {
    let d = v2 - v1;
    Vec2::new(d.y, -d.x).normalize_or_zero()
}

fn polygon_mass_data(poly: &Polygon, density: f32) -> MassData {
    let vertices = poly.vertices();
    let mut area = 0.0;
    let mut center = Vec2::ZERO;
    let mut inertia = 0.0;
    let reference = vertices[0];

    for i in 1..vertices.len() - 1 {
        let e1 = vertices[i] - reference;
        let e2 = vertices[i + 1] - reference;
        let d = cross(e1, e2);
        let triangle_area = 0.5 * d;
        area += triangle_area;
        center += triangle_area * (e1 + e2) / 3.0;

        let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
        inertia += (0.25 / 3.0) * d * (intx2 + inty2);
    }

    let mass = density * area;
    center /= area.max(f32::EPSILON);
    let centroid = reference + center;
    // Shift the reference-relative inertia to the shape origin.
    let inertia_about_origin = density * inertia
        + mass * (centroid.length_squared() - center.length_squared());
    MassData::new(mass, inertia_about_origin, centroid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_categories_and_groups() {
        let a = Filter {
            category: 0b01,
            mask: 0b10,
            group: 0,
        };
        let b = Filter {
            category: 0b10,
            mask: 0b01,
            group: 0,
        };
        assert!(a.should_collide(&b));

        let c = Filter {
            mask: 0b100,
            ..b
        };
        assert!(!a.should_collide(&c));

        let neg = Filter {
            group: -3,
            ..Filter::default()
        };
        assert!(!neg.should_collide(&neg.clone()));
        let pos = Filter {
            group: 3,
            category: 0,
            mask: 0,
        };
        assert!(pos.should_collide(&pos.clone()));
    }

    #[test]
    fn disk_mass_data_matches_area() {
        let shape = Shape::disk(2.0).density(3.0);
        let md = shape.mass_data();
        let expected = 3.0 * std::f32::consts::PI * 4.0;
        assert!((md.mass - expected).abs() < 1e-3);
        assert!((md.inertia - expected * 2.0).abs() < 1e-2);
        assert_eq!(md.center, Vec2::ZERO);
    }

    #[test]
    fn box_mass_data_matches_closed_form() {
        let shape = Shape::rect(0.5, 0.5).density(1.0);
        let md = shape.mass_data();
        assert!((md.mass - 1.0).abs() < 1e-5);
        assert!(md.center.length() < 1e-6);
        // Unit square: I = m (w² + h²) / 12.
        assert!((md.inertia - 1.0 / 6.0).abs() < 1e-4);
    }

    #[test]
    fn polygon_proxy_has_outward_normals() {
        let shape = Shape::rect(1.0, 1.0);
        let proxy = shape.child(0).unwrap();
        assert_eq!(proxy.count(), 4);
        for (i, n) in proxy.normals.iter().enumerate() {
            let v = proxy.vertices[i];
            assert!(n.dot(v) > 0.0, "normal {i} points inward");
        }
    }

    #[test]
    fn chain_exposes_one_child_per_segment() {
        let chain = Shape::new(ShapeGeometry::Chain(Chain::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 1.0),
        ])));
        assert_eq!(chain.child_count(), 2);
        let child = chain.child(1).unwrap();
        assert_eq!(child.vertices[0], Vec2::new(1.0, 0.0));
        assert!(chain.child(2).is_none());
    }

    #[test]
    fn support_prefers_lowest_index_on_ties() {
        let proxy = DistanceProxy::new(0.0, [Vec2::new(1.0, 1.0), Vec2::new(1.0, -1.0)], []);
        assert_eq!(proxy.support(Vec2::X), 0);
    }
}
