use serde::{Deserialize, Serialize};

use crate::collision::manifold::Manifold;
use crate::utils::allocator::EntityId;

/// Broad-phase pair key: the two tree leaf ids in sorted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContactKey {
    pub min: u32,
    pub max: u32,
}

impl ContactKey {
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

/// Narrow-phase pair state for two shape children on two bodies.
///
/// Ordering invariant: `body_a` never has a higher arena index than
/// `body_b`; the contact manager enforces this at creation.
#[derive(Debug, Clone)]
pub struct Contact {
    pub body_a: EntityId,
    pub shape_a: EntityId,
    pub child_a: usize,
    pub body_b: EntityId,
    pub shape_b: EntityId,
    pub child_b: usize,

    pub friction: f32,
    pub restitution: f32,
    /// Conveyor-style surface speed along the tangent.
    pub tangent_speed: f32,

    pub manifold: Manifold,

    /// Cached time of impact for the current step, if valid.
    pub toi: Option<f32>,
    /// Sub-steps consumed by this contact in the current step.
    pub toi_count: u32,

    pub is_enabled: bool,
    pub is_touching: bool,
    pub is_sensor: bool,
    /// At least one endpoint body is impenetrable.
    pub is_impenetrable: bool,
    /// At least one endpoint body was awake at creation or last update.
    pub is_active: bool,
    pub is_islanded: bool,
    pub needs_updating: bool,
    pub needs_filtering: bool,
}

impl Contact {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        body_a: EntityId,
        shape_a: EntityId,
        child_a: usize,
        body_b: EntityId,
        shape_b: EntityId,
        child_b: usize,
        friction: f32,
        restitution: f32,
    ) -> Self {
        Self {
            body_a,
            shape_a,
            child_a,
            body_b,
            shape_b,
            child_b,
            friction,
            restitution,
            tangent_speed: 0.0,
            manifold: Manifold::default(),
            toi: None,
            toi_count: 0,
            is_enabled: true,
            is_touching: false,
            is_sensor: false,
            is_impenetrable: false,
            is_active: false,
            is_islanded: false,
            needs_updating: true,
            needs_filtering: false,
        }
    }

    /// Geometric mean, so one slick surface dominates.
    pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
        (friction_a * friction_b).sqrt()
    }

    /// Maximum, so one bouncy surface dominates.
    pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
        restitution_a.max(restitution_b)
    }

    /// The body of this contact that is not `body`.
    pub fn other_body(&self, body: EntityId) -> EntityId {
        if self.body_a == body {
            self.body_b
        } else {
            self.body_a
        }
    }

    pub fn has_valid_toi(&self) -> bool {
        self.toi.is_some()
    }

    pub fn unset_toi(&mut self) {
        self.toi = None;
    }

    /// Installs a freshly collided manifold, carrying accumulated impulses
    /// over from the old one.
    ///
    /// Points are matched by contact feature; a point with no feature match
    /// inherits from the nearest old point instead, since missing a warm
    /// start makes stacks squishy. Returns `(old_touching, new_touching)`.
    pub fn update_manifold(&mut self, mut new_manifold: Manifold) -> (bool, bool) {
        let old_manifold = std::mem::take(&mut self.manifold);
        let old_touching = self.is_touching;
        let new_touching = new_manifold.is_touching();

        let mut matched = [false; 2];
        for (i, new_point) in new_manifold.points.iter_mut().enumerate() {
            for old_point in &old_manifold.points {
                if old_point.contact_feature == new_point.contact_feature {
                    new_point.normal_impulse = old_point.normal_impulse;
                    new_point.tangent_impulse = old_point.tangent_impulse;
                    matched[i] = true;
                    break;
                }
            }
        }
        for (i, new_point) in new_manifold.points.iter_mut().enumerate() {
            if matched[i] || old_manifold.points.is_empty() {
                continue;
            }
            let mut least = f32::INFINITY;
            for old_point in &old_manifold.points {
                let diff = old_point
                    .local_point
                    .distance_squared(new_point.local_point);
                if diff < least {
                    least = diff;
                    new_point.normal_impulse = old_point.normal_impulse;
                    new_point.tangent_impulse = old_point.tangent_impulse;
                }
            }
        }

        self.manifold = new_manifold;
        self.is_touching = new_touching;
        self.needs_updating = false;
        (old_touching, new_touching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::{ContactFeature, ManifoldKind, ManifoldPoint};
    use glam::Vec2;
    use smallvec::smallvec;

    fn manifold_with(points: &[(ContactFeature, Vec2, f32)]) -> Manifold {
        Manifold {
            kind: ManifoldKind::FaceA,
            local_normal: Vec2::X,
            local_point: Vec2::ZERO,
            points: points
                .iter()
                .map(|(cf, lp, ni)| ManifoldPoint {
                    local_point: *lp,
                    contact_feature: *cf,
                    normal_impulse: *ni,
                    tangent_impulse: 0.5 * *ni,
                })
                .collect(),
        }
    }

    fn test_contact() -> Contact {
        Contact::new(
            EntityId::from_index(0),
            EntityId::from_index(0),
            0,
            EntityId::from_index(1),
            EntityId::from_index(1),
            0,
            0.5,
            0.0,
        )
    }

    #[test]
    fn key_orders_its_leaves() {
        let key = ContactKey::new(9, 3);
        assert_eq!(key.min, 3);
        assert_eq!(key.max, 9);
        assert_eq!(key, ContactKey::new(3, 9));
    }

    #[test]
    fn matching_features_carry_impulses() {
        let mut contact = test_contact();
        let cf = ContactFeature::face_vertex(1, 2);
        contact.update_manifold(manifold_with(&[(cf, Vec2::ZERO, 3.0)]));

        contact.update_manifold(manifold_with(&[(cf, Vec2::new(0.1, 0.0), 0.0)]));
        assert_eq!(contact.manifold.points[0].normal_impulse, 3.0);
        assert_eq!(contact.manifold.points[0].tangent_impulse, 1.5);
    }

    #[test]
    fn unmatched_points_fall_back_to_nearest() {
        let mut contact = test_contact();
        let cf_old = ContactFeature::face_vertex(0, 0);
        let far = (cf_old, Vec2::new(5.0, 0.0), 1.0);
        let near = (ContactFeature::face_vertex(0, 1), Vec2::new(0.1, 0.0), 7.0);
        contact.update_manifold(manifold_with(&[far, near]));

        let cf_new = ContactFeature::face_vertex(2, 2);
        contact.update_manifold(manifold_with(&[(cf_new, Vec2::ZERO, 0.0)]));
        assert_eq!(contact.manifold.points[0].normal_impulse, 7.0);
    }

    #[test]
    fn touching_transitions_are_reported() {
        let mut contact = test_contact();
        let cf = ContactFeature::vertex_vertex(0, 0);
        let (old, new) = contact.update_manifold(manifold_with(&[(cf, Vec2::ZERO, 0.0)]));
        assert!(!old);
        assert!(new);

        let empty = Manifold {
            kind: ManifoldKind::Unset,
            local_normal: Vec2::ZERO,
            local_point: Vec2::ZERO,
            points: smallvec![],
        };
        let (old, new) = contact.update_manifold(empty);
        assert!(old);
        assert!(!new);
        assert!(!contact.is_touching);
    }
}
