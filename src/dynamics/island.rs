use crate::utils::allocator::EntityId;

/// A connected set of bodies, contacts, and joints solved as one unit.
///
/// Islands hold only ids; the storage is reused across islands of a step by
/// clearing rather than dropping.
#[derive(Debug, Default)]
pub struct Island {
    pub bodies: Vec<EntityId>,
    pub contacts: Vec<EntityId>,
    pub joints: Vec<EntityId>,
}

impl Island {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears contents while keeping allocated capacity.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Grows capacity toward the remaining un-islanded entity counts.
    pub fn reserve(&mut self, bodies: usize, contacts: usize, joints: usize) {
        self.bodies.reserve(bodies.saturating_sub(self.bodies.capacity()));
        self.contacts
            .reserve(contacts.saturating_sub(self.contacts.capacity()));
        self.joints.reserve(joints.saturating_sub(self.joints.capacity()));
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty() && self.contacts.is_empty() && self.joints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_keeps_capacity() {
        let mut island = Island::new();
        for i in 0..32 {
            island.bodies.push(EntityId::from_index(i));
        }
        let cap = island.bodies.capacity();
        island.clear();
        assert!(island.is_empty());
        assert_eq!(island.bodies.capacity(), cap);
    }
}
