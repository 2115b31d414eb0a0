use glam::Vec2;
use smallvec::SmallVec;

use crate::collision::clipping::{clip_segment_to_line, ClipVertex};
use crate::collision::distance::max_separation;
use crate::config::LINEAR_SLOP;
use crate::core::shapes::DistanceProxy;
use crate::core::types::Transform;

/// Kind of feature a manifold point was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureType {
    #[default]
    Vertex,
    Face,
}

/// Feature pair identifying a contact point across frames.
///
/// Two manifold points with equal features are the same physical contact
/// and may exchange accumulated impulses for warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactFeature {
    pub type_a: FeatureType,
    pub index_a: u8,
    pub type_b: FeatureType,
    pub index_b: u8,
}

impl ContactFeature {
    pub fn vertex_vertex(index_a: u8, index_b: u8) -> Self {
        Self {
            type_a: FeatureType::Vertex,
            index_a,
            type_b: FeatureType::Vertex,
            index_b,
        }
    }

    pub fn face_vertex(index_a: u8, index_b: u8) -> Self {
        Self {
            type_a: FeatureType::Face,
            index_a,
            type_b: FeatureType::Vertex,
            index_b,
        }
    }

    /// Same feature seen from the other shape's perspective.
    pub fn flipped(self) -> Self {
        Self {
            type_a: self.type_b,
            index_a: self.index_b,
            type_b: self.type_a,
            index_b: self.index_a,
        }
    }
}

/// One persisted contact point with its accumulated impulses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifoldPoint {
    /// Local point on the incident shape (B for face-A manifolds, A for
    /// face-B, B's center for circles).
    pub local_point: Vec2,
    pub contact_feature: ContactFeature,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
}

/// Manifold classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldKind {
    /// No contact.
    #[default]
    Unset,
    /// Point-to-point contact between two rounded vertices.
    Circles,
    /// Reference face on shape A.
    FaceA,
    /// Reference face on shape B.
    FaceB,
}

/// Narrow-phase contact description in the local frames of the two shapes.
#[derive(Debug, Clone, Default)]
pub struct Manifold {
    pub kind: ManifoldKind,
    /// Face normal in the reference shape's frame (face manifolds only).
    pub local_normal: Vec2,
    /// Reference point: face midpoint for face manifolds, A's vertex for
    /// circles.
    pub local_point: Vec2,
    pub points: SmallVec<[ManifoldPoint; 2]>,
}

impl Manifold {
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_touching(&self) -> bool {
        !matches!(self.kind, ManifoldKind::Unset) && !self.points.is_empty()
    }

    /// The manifold as seen with the shape roles exchanged.
    pub fn flipped(&self) -> Manifold {
        let kind = match self.kind {
            ManifoldKind::Unset => ManifoldKind::Unset,
            ManifoldKind::Circles => ManifoldKind::Circles,
            ManifoldKind::FaceA => ManifoldKind::FaceB,
            ManifoldKind::FaceB => ManifoldKind::FaceA,
        };
        let mut out = Manifold {
            kind,
            local_normal: self.local_normal,
            local_point: self.local_point,
            points: SmallVec::new(),
        };
        if kind == ManifoldKind::Circles {
            // Circle manifolds store A's point in `local_point` and B's in
            // the manifold point; swapping roles exchanges them.
            if let Some(p) = self.points.first() {
                out.local_point = p.local_point;
                out.points.push(ManifoldPoint {
                    local_point: self.local_point,
                    contact_feature: p.contact_feature.flipped(),
                    normal_impulse: p.normal_impulse,
                    tangent_impulse: p.tangent_impulse,
                });
            }
            return out;
        }
        for p in &self.points {
            out.points.push(ManifoldPoint {
                local_point: p.local_point,
                contact_feature: p.contact_feature.flipped(),
                normal_impulse: p.normal_impulse,
                tangent_impulse: p.tangent_impulse,
            });
        }
        out
    }
}

/// World-space projection of a manifold used by the solvers.
#[derive(Debug, Clone, Default)]
pub struct WorldManifold {
    /// Unit normal pointing from A to B.
    pub normal: Vec2,
    pub points: SmallVec<[Vec2; 2]>,
    pub separations: SmallVec<[f32; 2]>,
}

impl WorldManifold {
    /// Projects `manifold` into world space at the given transforms and
    /// vertex radii.
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = WorldManifold::default();
        match manifold.kind {
            ManifoldKind::Unset => {}
            ManifoldKind::Circles => {
                let point_a = xf_a.transform_point(manifold.local_point);
                let point_b = match manifold.points.first() {
                    Some(p) => xf_b.transform_point(p.local_point),
                    None => return out,
                };
                let delta = point_b - point_a;
                out.normal = if delta.length_squared() > f32::EPSILON * f32::EPSILON {
                    delta.normalize()
                } else {
                    Vec2::X
                };
                let c_a = point_a + radius_a * out.normal;
                let c_b = point_b - radius_b * out.normal;
                out.points.push(0.5 * (c_a + c_b));
                out.separations.push((c_b - c_a).dot(out.normal));
            }
            ManifoldKind::FaceA => {
                out.normal = xf_a.q.rotate(manifold.local_normal);
                let plane_point = xf_a.transform_point(manifold.local_point);
                for p in &manifold.points {
                    let clip_point = xf_b.transform_point(p.local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_b = clip_point - radius_b * out.normal;
                    out.points.push(0.5 * (c_a + c_b));
                    out.separations.push((c_b - c_a).dot(out.normal));
                }
            }
            ManifoldKind::FaceB => {
                let normal_b = xf_b.q.rotate(manifold.local_normal);
                let plane_point = xf_b.transform_point(manifold.local_point);
                for p in &manifold.points {
                    let clip_point = xf_a.transform_point(p.local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(normal_b)) * normal_b;
                    let c_a = clip_point - radius_a * normal_b;
                    out.points.push(0.5 * (c_a + c_b));
                    out.separations.push((c_a - c_b).dot(normal_b));
                }
                // Report the normal from A to B.
                out.normal = -normal_b;
            }
        }
        out
    }
}

/// Narrow-phase dispatch over proxy cardinalities.
pub fn collide_shapes(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
) -> Manifold {
    match (proxy_a.count(), proxy_b.count()) {
        (0, _) | (_, 0) => Manifold::default(),
        (1, 1) => collide_circles(proxy_a, xf_a, proxy_b, xf_b),
        (_, 1) => collide_polygon_circle(proxy_a, xf_a, proxy_b, xf_b),
        (1, _) => collide_polygon_circle(proxy_b, xf_b, proxy_a, xf_a).flipped(),
        _ => collide_polygons(proxy_a, xf_a, proxy_b, xf_b),
    }
}

fn collide_circles(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
) -> Manifold {
    let pa = xf_a.transform_point(proxy_a.vertices[0]);
    let pb = xf_b.transform_point(proxy_b.vertices[0]);
    let total_radius = proxy_a.vertex_radius + proxy_b.vertex_radius;
    if pa.distance_squared(pb) > total_radius * total_radius {
        return Manifold::default();
    }
    let mut manifold = Manifold {
        kind: ManifoldKind::Circles,
        local_normal: Vec2::ZERO,
        local_point: proxy_a.vertices[0],
        points: SmallVec::new(),
    };
    manifold.points.push(ManifoldPoint {
        local_point: proxy_b.vertices[0],
        contact_feature: ContactFeature::vertex_vertex(0, 0),
        ..Default::default()
    });
    manifold
}

/// Polygon-like reference shape A against a single rounded vertex B.
fn collide_polygon_circle(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
) -> Manifold {
    let total_radius = proxy_a.vertex_radius + proxy_b.vertex_radius;
    // Circle center in A's frame.
    let c = xf_a.inv_transform_point(xf_b.transform_point(proxy_b.vertices[0]));

    let mut separation = f32::NEG_INFINITY;
    let mut normal_index = 0;
    for (i, n) in proxy_a.normals.iter().enumerate() {
        let s = n.dot(c - proxy_a.vertices[i]);
        if s > total_radius {
            return Manifold::default();
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = proxy_a.vertices[normal_index];
    let v2 = proxy_a.vertices[(normal_index + 1) % proxy_a.count()];

    let mut manifold = Manifold {
        kind: ManifoldKind::FaceA,
        ..Default::default()
    };
    let feature = ContactFeature::face_vertex(normal_index as u8, 0);

    if separation < f32::EPSILON {
        // Center is inside A; use the deepest face directly.
        manifold.local_normal = proxy_a.normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
    } else {
        // Voronoi regions of the face's end vertices.
        let u1 = (c - v1).dot(v2 - v1);
        let u2 = (c - v2).dot(v1 - v2);
        if u1 <= 0.0 {
            if c.distance_squared(v1) > total_radius * total_radius {
                return Manifold::default();
            }
            manifold.local_normal = (c - v1).normalize_or_zero();
            manifold.local_point = v1;
        } else if u2 <= 0.0 {
            if c.distance_squared(v2) > total_radius * total_radius {
                return Manifold::default();
            }
            manifold.local_normal = (c - v2).normalize_or_zero();
            manifold.local_point = v2;
        } else {
            manifold.local_normal = proxy_a.normals[normal_index];
            manifold.local_point = 0.5 * (v1 + v2);
        }
    }

    manifold.points.push(ManifoldPoint {
        local_point: proxy_b.vertices[0],
        contact_feature: feature,
        ..Default::default()
    });
    manifold
}

/// Two polygon-like proxies: SAT face selection plus incident-edge clipping.
fn collide_polygons(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
) -> Manifold {
    let total_radius = proxy_a.vertex_radius + proxy_b.vertex_radius;

    let sep_a = max_separation(proxy_a, xf_a, proxy_b, xf_b, total_radius);
    if sep_a.separation > total_radius {
        return Manifold::default();
    }
    let sep_b = max_separation(proxy_b, xf_b, proxy_a, xf_a, total_radius);
    if sep_b.separation > total_radius {
        return Manifold::default();
    }

    // Deeper side becomes the reference, with a slop-scaled bias toward A
    // so the choice is stable frame to frame.
    let (reference, incident, xf_ref, xf_inc, edge1, flip) =
        if sep_b.separation > sep_a.separation + 0.1 * LINEAR_SLOP {
            (proxy_b, proxy_a, xf_b, xf_a, sep_b.index, true)
        } else {
            (proxy_a, proxy_b, xf_a, xf_b, sep_a.index, false)
        };

    let incident_edge = find_incident_edge(reference, edge1, incident, xf_ref, xf_inc);

    let count1 = reference.count();
    let iv1 = edge1;
    let iv2 = (edge1 + 1) % count1;
    let v11 = reference.vertices[iv1];
    let v12 = reference.vertices[iv2];

    let local_tangent = (v12 - v11).normalize_or_zero();
    let local_normal = Vec2::new(local_tangent.y, -local_tangent.x);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf_ref.q.rotate(local_tangent);
    let normal = Vec2::new(tangent.y, -tangent.x);

    let v11w = xf_ref.transform_point(v11);
    let v12w = xf_ref.transform_point(v12);

    let front_offset = normal.dot(v11w);
    let side_offset1 = -tangent.dot(v11w) + total_radius;
    let side_offset2 = tangent.dot(v12w) + total_radius;

    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    let np = clip_segment_to_line(
        &mut clip_points1,
        &incident_edge,
        -tangent,
        side_offset1,
        iv1 as u8,
    );
    if np < 2 {
        return Manifold::default();
    }
    let np = clip_segment_to_line(
        &mut clip_points2,
        &clip_points1,
        tangent,
        side_offset2,
        iv2 as u8,
    );
    if np < 2 {
        return Manifold::default();
    }

    let mut manifold = Manifold {
        kind: if flip {
            ManifoldKind::FaceB
        } else {
            ManifoldKind::FaceA
        },
        local_normal,
        local_point: plane_point,
        points: SmallVec::new(),
    };

    for clip in clip_points2.iter() {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            manifold.points.push(ManifoldPoint {
                local_point: xf_inc.inv_transform_point(clip.v),
                contact_feature: if flip { clip.cf.flipped() } else { clip.cf },
                ..Default::default()
            });
        }
    }

    if manifold.points.is_empty() {
        return Manifold::default();
    }
    manifold
}

/// Edge on the incident proxy most anti-parallel to the reference normal.
fn find_incident_edge(
    reference: &DistanceProxy,
    edge1: usize,
    incident: &DistanceProxy,
    xf_ref: &Transform,
    xf_inc: &Transform,
) -> [ClipVertex; 2] {
    // Reference normal in the incident proxy's frame.
    let normal1 = xf_inc
        .q
        .inv_rotate(xf_ref.q.rotate(reference.normals[edge1]));

    let mut index = 0;
    let mut min_dot = f32::INFINITY;
    for (i, n) in incident.normals.iter().enumerate() {
        let dot = normal1.dot(*n);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (index + 1) % incident.count();

    [
        ClipVertex {
            v: xf_inc.transform_point(incident.vertices[i1]),
            cf: ContactFeature {
                type_a: FeatureType::Face,
                index_a: edge1 as u8,
                type_b: FeatureType::Vertex,
                index_b: i1 as u8,
            },
        },
        ClipVertex {
            v: xf_inc.transform_point(incident.vertices[i2]),
            cf: ContactFeature {
                type_a: FeatureType::Face,
                index_a: edge1 as u8,
                type_b: FeatureType::Vertex,
                index_b: i2 as u8,
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::Shape;

    #[test]
    fn separated_disks_produce_no_manifold() {
        let a = Shape::disk(0.2).child(0).unwrap();
        let b = Shape::disk(0.2).child(0).unwrap();
        let m = collide_shapes(
            &a,
            &Transform::from_angle(Vec2::new(-1.0, 0.0), 0.0),
            &b,
            &Transform::from_angle(Vec2::new(1.0, 0.0), 0.0),
        );
        assert_eq!(m.kind, ManifoldKind::Unset);
        assert!(!m.is_touching());
    }

    #[test]
    fn touching_disks_produce_circle_manifold() {
        let a = Shape::disk(1.0).child(0).unwrap();
        let b = Shape::disk(1.0).child(0).unwrap();
        let m = collide_shapes(
            &a,
            &Transform::from_angle(Vec2::new(-0.9, 0.0), 0.0),
            &b,
            &Transform::from_angle(Vec2::new(0.9, 0.0), 0.0),
        );
        assert_eq!(m.kind, ManifoldKind::Circles);
        assert_eq!(m.point_count(), 1);

        let wm = WorldManifold::new(
            &m,
            &Transform::from_angle(Vec2::new(-0.9, 0.0), 0.0),
            1.0,
            &Transform::from_angle(Vec2::new(0.9, 0.0), 0.0),
            1.0,
        );
        assert!((wm.normal - Vec2::X).length() < 1e-5);
        assert!((wm.separations[0] + 0.2).abs() < 1e-5);
    }

    #[test]
    fn overlapping_boxes_produce_two_face_points() {
        let a = Shape::rect(1.0, 1.0).child(0).unwrap();
        let b = Shape::rect(1.0, 1.0).child(0).unwrap();
        let m = collide_shapes(
            &a,
            &Transform::from_angle(Vec2::ZERO, 0.0),
            &b,
            &Transform::from_angle(Vec2::new(1.9, 0.0), 0.0),
        );
        assert!(matches!(m.kind, ManifoldKind::FaceA | ManifoldKind::FaceB));
        assert_eq!(m.point_count(), 2);

        let wm = WorldManifold::new(
            &m,
            &Transform::from_angle(Vec2::ZERO, 0.0),
            a.vertex_radius,
            &Transform::from_angle(Vec2::new(1.9, 0.0), 0.0),
            b.vertex_radius,
        );
        assert!((wm.normal.x - 1.0).abs() < 1e-4);
        for s in &wm.separations {
            assert!(*s < 0.0);
        }
    }

    #[test]
    fn box_on_circle_flips_to_face_b() {
        let circle = Shape::disk(0.5).child(0).unwrap();
        let b = Shape::rect(1.0, 1.0).child(0).unwrap();
        let m = collide_shapes(
            &circle,
            &Transform::from_angle(Vec2::new(0.0, 1.4), 0.0),
            &b,
            &Transform::from_angle(Vec2::ZERO, 0.0),
        );
        assert_eq!(m.kind, ManifoldKind::FaceB);
        assert_eq!(m.point_count(), 1);
        let wm = WorldManifold::new(
            &m,
            &Transform::from_angle(Vec2::new(0.0, 1.4), 0.0),
            0.5,
            &Transform::from_angle(Vec2::ZERO, 0.0),
            b.vertex_radius,
        );
        // Normal runs from the circle (A) into the box (B).
        assert!(wm.normal.y < -0.9);
    }

    #[test]
    fn features_are_stable_across_small_motion() {
        let a = Shape::rect(1.0, 1.0).child(0).unwrap();
        let b = Shape::rect(1.0, 1.0).child(0).unwrap();
        let m1 = collide_shapes(
            &a,
            &Transform::from_angle(Vec2::ZERO, 0.0),
            &b,
            &Transform::from_angle(Vec2::new(1.95, 0.01), 0.0),
        );
        let m2 = collide_shapes(
            &a,
            &Transform::from_angle(Vec2::ZERO, 0.0),
            &b,
            &Transform::from_angle(Vec2::new(1.94, 0.012), 0.0),
        );
        assert_eq!(m1.point_count(), m2.point_count());
        for (p1, p2) in m1.points.iter().zip(m2.points.iter()) {
            assert_eq!(p1.contact_feature, p2.contact_feature);
        }
    }
}
