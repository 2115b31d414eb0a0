use glam::Vec2;

use crate::collision::aabb::Aabb;
use crate::collision::queries::RayCastInput;
use crate::utils::allocator::EntityId;
use crate::utils::math::cross;
use crate::utils::stack::GrowableStack;

/// Sentinel index for "no node".
pub const NULL_NODE: u32 = u32::MAX;

/// Payload stored on a broad-phase leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafData {
    pub body: EntityId,
    pub shape: EntityId,
    pub child_index: usize,
}

#[derive(Debug, Clone)]
struct TreeNode {
    aabb: Aabb,
    data: Option<LeafData>,
    /// Parent when allocated; next free index when on the free list.
    parent: u32,
    child1: u32,
    child2: u32,
    /// 0 for leaves, -1 for free nodes.
    height: i32,
}

impl TreeNode {
    fn free() -> Self {
        Self {
            aabb: Aabb::EMPTY,
            data: None,
            parent: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: -1,
        }
    }

    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// Dynamic bounding-volume hierarchy used as the broad phase.
///
/// Leaves store fattened AABBs so that small motion does not force a
/// re-insertion. Insertion picks the sibling minimizing the surface-area
/// heuristic and the tree is rebalanced with single rotations whenever a
/// subtree's height imbalance reaches 2.
pub struct DynamicTree {
    nodes: Vec<TreeNode>,
    root: u32,
    free_list: u32,
    node_count: u32,
    leaf_count: u32,
}

impl Default for DynamicTree {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_INITIAL_TREE_SIZE)
    }
}

impl DynamicTree {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut tree = Self {
            nodes: Vec::with_capacity(capacity),
            root: NULL_NODE,
            free_list: NULL_NODE,
            node_count: 0,
            leaf_count: 0,
        };
        tree.grow(capacity);
        tree
    }

    fn grow(&mut self, additional: usize) {
        let start = self.nodes.len();
        self.nodes
            .extend(std::iter::repeat_with(TreeNode::free).take(additional));
        // Chain the new slots onto the free list, newest first.
        for i in (start..self.nodes.len()).rev() {
            self.nodes[i].parent = self.free_list;
            self.free_list = i as u32;
        }
    }

    fn allocate_node(&mut self) -> u32 {
        if self.free_list == NULL_NODE {
            let len = self.nodes.len();
            self.grow(len.max(1));
        }
        let index = self.free_list;
        self.free_list = self.nodes[index as usize].parent;
        self.nodes[index as usize] = TreeNode {
            parent: NULL_NODE,
            ..TreeNode::free()
        };
        self.nodes[index as usize].height = 0;
        self.node_count += 1;
        index
    }

    fn free_node(&mut self, index: u32) {
        debug_assert!(self.node_count > 0);
        self.nodes[index as usize] = TreeNode::free();
        self.nodes[index as usize].parent = self.free_list;
        self.free_list = index;
        self.node_count -= 1;
    }

    /// Inserts a leaf with an already-fattened AABB.
    pub fn create_leaf(&mut self, aabb: Aabb, data: LeafData) -> u32 {
        let leaf = self.allocate_node();
        self.nodes[leaf as usize].aabb = aabb;
        self.nodes[leaf as usize].data = Some(data);
        self.insert_leaf(leaf);
        self.leaf_count += 1;
        leaf
    }

    pub fn destroy_leaf(&mut self, id: u32) {
        debug_assert!(self.is_leaf_id(id));
        self.remove_leaf(id);
        self.free_node(id);
        self.leaf_count -= 1;
    }

    /// Re-inserts a leaf only when its stored fattened AABB no longer
    /// contains the new tight AABB.
    ///
    /// `displacement` should already carry the predictive multiplier.
    /// Returns true when the leaf actually moved in the tree.
    pub fn update_leaf(
        &mut self,
        id: u32,
        tight: Aabb,
        displacement: Vec2,
        extension: f32,
    ) -> bool {
        debug_assert!(self.is_leaf_id(id));
        if self.nodes[id as usize].aabb.contains(&tight) {
            return false;
        }
        let fat = tight.fattened(extension).displaced(displacement);
        self.remove_leaf(id);
        self.nodes[id as usize].aabb = fat;
        self.insert_leaf(id);
        true
    }

    pub fn get_aabb(&self, id: u32) -> Option<Aabb> {
        self.nodes
            .get(id as usize)
            .filter(|n| n.height >= 0)
            .map(|n| n.aabb)
    }

    pub fn get_leaf_data(&self, id: u32) -> Option<LeafData> {
        self.nodes.get(id as usize).and_then(|n| n.data)
    }

    pub fn leaf_count(&self) -> u32 {
        self.leaf_count
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    /// Do the fattened AABBs of two leaves overlap?
    pub fn test_overlap(&self, a: u32, b: u32) -> bool {
        match (self.get_aabb(a), self.get_aabb(b)) {
            (Some(aabb_a), Some(aabb_b)) => aabb_a.overlaps(&aabb_b),
            _ => false,
        }
    }

    /// Drops every node and reinitialises the free list.
    pub fn clear(&mut self) {
        let capacity = self.nodes.len().max(1);
        self.nodes.clear();
        self.root = NULL_NODE;
        self.free_list = NULL_NODE;
        self.node_count = 0;
        self.leaf_count = 0;
        self.grow(capacity);
    }

    /// Translates every stored AABB, as when the world origin shifts.
    pub fn shift_origin(&mut self, delta: Vec2) {
        for node in &mut self.nodes {
            if node.height >= 0 {
                node.aabb = node.aabb.translated(-delta);
            }
        }
    }

    /// Emits the id of every leaf whose AABB overlaps `aabb`, depth first.
    /// The callback returns false to stop the query.
    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(u32) -> bool) {
        let mut stack: GrowableStack<u32, 64> = GrowableStack::new();
        if self.root != NULL_NODE {
            stack.push(self.root);
        }
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            if node.is_leaf() {
                if !callback(index) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Clips a ray against the tree.
    ///
    /// The callback receives the clipped input and a candidate leaf and
    /// returns the new maximum fraction: 0 stops the cast, a smaller value
    /// clips later candidates, and the incoming fraction leaves it unchanged.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        mut callback: impl FnMut(&RayCastInput, u32) -> f32,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = (p2 - p1).normalize_or_zero();
        if r == Vec2::ZERO {
            return;
        }
        // Perpendicular extents used for the fat segment test.
        let abs_v = Vec2::new(r.y.abs(), r.x.abs());

        let mut max_fraction = input.max_fraction;
        let mut segment_aabb = segment_bounds(p1, p2, max_fraction);

        let mut stack: GrowableStack<u32, 64> = GrowableStack::new();
        if self.root != NULL_NODE {
            stack.push(self.root);
        }
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            // Separating-axis check of the segment against the box.
            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = cross(r, p1 - c).abs() - h.dot(abs_v);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };
                let value = callback(&sub_input, index);
                if value == 0.0 {
                    return;
                }
                if value > 0.0 {
                    max_fraction = value;
                    segment_aabb = segment_bounds(p1, p2, max_fraction);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    fn is_leaf_id(&self, id: u32) -> bool {
        self.nodes
            .get(id as usize)
            .map(|n| n.height == 0 && n.data.is_some())
            .unwrap_or(false)
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        }

        // Find the best sibling by descending the cheaper SAH branch.
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = self.root;
        while !self.nodes[index as usize].is_leaf() {
            let node = &self.nodes[index as usize];
            let child1 = node.child1;
            let child2 = node.child2;

            let area = node.aabb.perimeter();
            let combined_area = node.aabb.union(&leaf_aabb).perimeter();

            // Cost of pairing the leaf with this whole subtree.
            let cost = 2.0 * combined_area;
            let inheritance = 2.0 * (combined_area - area);

            let cost1 = descend_cost(&self.nodes[child1 as usize], &leaf_aabb) + inheritance;
            let cost2 = descend_cost(&self.nodes[child2 as usize], &leaf_aabb) + inheritance;

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { child1 } else { child2 };
        }
        let sibling = index;

        // Splice a fresh parent above the sibling.
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.allocate_node();
        self.nodes[new_parent as usize].parent = old_parent;
        self.nodes[new_parent as usize].aabb = leaf_aabb.union(&self.nodes[sibling as usize].aabb);
        self.nodes[new_parent as usize].height = self.nodes[sibling as usize].height + 1;
        self.nodes[new_parent as usize].child1 = sibling;
        self.nodes[new_parent as usize].child2 = leaf;
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent as usize].child1 == sibling {
            self.nodes[old_parent as usize].child1 = new_parent;
        } else {
            self.nodes[old_parent as usize].child2 = new_parent;
        }

        // Refit and rebalance back to the root.
        let mut walk = self.nodes[leaf as usize].parent;
        while walk != NULL_NODE {
            walk = self.balance(walk);
            let child1 = self.nodes[walk as usize].child1;
            let child2 = self.nodes[walk as usize].child2;
            self.nodes[walk as usize].height = 1 + self.nodes[child1 as usize]
                .height
                .max(self.nodes[child2 as usize].height);
            self.nodes[walk as usize].aabb = self.nodes[child1 as usize]
                .aabb
                .union(&self.nodes[child2 as usize].aabb);
            walk = self.nodes[walk as usize].parent;
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if self.root == leaf {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grand_parent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].child1 == leaf {
            self.nodes[parent as usize].child2
        } else {
            self.nodes[parent as usize].child1
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
            return;
        }

        // Collapse the parent out of the tree.
        if self.nodes[grand_parent as usize].child1 == parent {
            self.nodes[grand_parent as usize].child1 = sibling;
        } else {
            self.nodes[grand_parent as usize].child2 = sibling;
        }
        self.nodes[sibling as usize].parent = grand_parent;
        self.free_node(parent);

        let mut walk = grand_parent;
        while walk != NULL_NODE {
            walk = self.balance(walk);
            let child1 = self.nodes[walk as usize].child1;
            let child2 = self.nodes[walk as usize].child2;
            self.nodes[walk as usize].aabb = self.nodes[child1 as usize]
                .aabb
                .union(&self.nodes[child2 as usize].aabb);
            self.nodes[walk as usize].height = 1 + self.nodes[child1 as usize]
                .height
                .max(self.nodes[child2 as usize].height);
            walk = self.nodes[walk as usize].parent;
        }
    }

    /// Single tree rotation restoring a height balance of at most 1 at `a`.
    /// Returns the index now occupying `a`'s place.
    fn balance(&mut self, a: u32) -> u32 {
        if self.nodes[a as usize].is_leaf() || self.nodes[a as usize].height < 2 {
            return a;
        }

        let b = self.nodes[a as usize].child1;
        let c = self.nodes[a as usize].child2;
        let balance = self.nodes[c as usize].height - self.nodes[b as usize].height;

        if balance > 1 {
            return self.rotate_up(a, c, b);
        }
        if balance < -1 {
            return self.rotate_up(a, b, c);
        }
        a
    }

    /// Rotates child `up` above node `a`; `keep` is a's other child.
    fn rotate_up(&mut self, a: u32, up: u32, keep: u32) -> u32 {
        let g1 = self.nodes[up as usize].child1;
        let g2 = self.nodes[up as usize].child2;

        self.nodes[up as usize].child1 = a;
        self.nodes[up as usize].parent = self.nodes[a as usize].parent;
        self.nodes[a as usize].parent = up;

        let up_parent = self.nodes[up as usize].parent;
        if up_parent != NULL_NODE {
            if self.nodes[up_parent as usize].child1 == a {
                self.nodes[up_parent as usize].child1 = up;
            } else {
                self.nodes[up_parent as usize].child2 = up;
            }
        } else {
            self.root = up;
        }

        // The taller grandchild stays on `up`; the shorter replaces `up`
        // under `a`.
        let (tall, short) = if self.nodes[g1 as usize].height > self.nodes[g2 as usize].height {
            (g1, g2)
        } else {
            (g2, g1)
        };
        self.nodes[up as usize].child2 = tall;
        if self.nodes[a as usize].child1 == up {
            self.nodes[a as usize].child1 = short;
        } else {
            self.nodes[a as usize].child2 = short;
        }
        self.nodes[short as usize].parent = a;

        self.nodes[a as usize].aabb = self.nodes[keep as usize]
            .aabb
            .union(&self.nodes[short as usize].aabb);
        self.nodes[up as usize].aabb = self.nodes[a as usize]
            .aabb
            .union(&self.nodes[tall as usize].aabb);
        self.nodes[a as usize].height = 1 + self.nodes[keep as usize]
            .height
            .max(self.nodes[short as usize].height);
        self.nodes[up as usize].height = 1 + self.nodes[a as usize]
            .height
            .max(self.nodes[tall as usize].height);

        up
    }

    /// Checks parent/child wiring from `index` down.
    pub fn validate_structure(&self, index: u32) -> bool {
        if index == NULL_NODE {
            return true;
        }
        let node = &self.nodes[index as usize];
        if index == self.root && node.parent != NULL_NODE {
            return false;
        }
        if node.is_leaf() {
            return node.child2 == NULL_NODE && node.height == 0 && node.data.is_some();
        }
        let child1 = node.child1;
        let child2 = node.child2;
        if self.nodes[child1 as usize].parent != index
            || self.nodes[child2 as usize].parent != index
        {
            return false;
        }
        self.validate_structure(child1) && self.validate_structure(child2)
    }

    /// Checks stored heights and AABBs against recomputed values.
    pub fn validate_metrics(&self, index: u32) -> bool {
        if index == NULL_NODE {
            return true;
        }
        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return node.height == 0;
        }
        let child1 = node.child1;
        let child2 = node.child2;
        let height = 1 + self.nodes[child1 as usize]
            .height
            .max(self.nodes[child2 as usize].height);
        if node.height != height {
            return false;
        }
        let aabb = self.nodes[child1 as usize]
            .aabb
            .union(&self.nodes[child2 as usize].aabb);
        if aabb != node.aabb {
            return false;
        }
        self.validate_metrics(child1) && self.validate_metrics(child2)
    }

    pub fn root(&self) -> u32 {
        self.root
    }

    /// Largest height difference between any node's children.
    pub fn max_balance(&self) -> i32 {
        let mut max_balance = 0;
        for node in &self.nodes {
            if node.height <= 1 {
                continue;
            }
            let b = (self.nodes[node.child2 as usize].height
                - self.nodes[node.child1 as usize].height)
                .abs();
            max_balance = max_balance.max(b);
        }
        max_balance
    }
}

fn descend_cost(child: &TreeNode, leaf_aabb: &Aabb) -> f32 {
    let combined = child.aabb.union(leaf_aabb).perimeter();
    if child.is_leaf() {
        combined
    } else {
        combined - child.aabb.perimeter()
    }
}

fn segment_bounds(p1: Vec2, p2: Vec2, fraction: f32) -> Aabb {
    let t = p1 + fraction * (p2 - p1);
    Aabb::new(p1.min(t), p1.max(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_data(i: u32) -> LeafData {
        LeafData {
            body: EntityId::from_index(i),
            shape: EntityId::from_index(i),
            child_index: 0,
        }
    }

    fn unit_box_at(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
    }

    #[test]
    fn insert_query_destroy_round_trip() {
        let mut tree = DynamicTree::new(16);
        let a = tree.create_leaf(unit_box_at(0.0, 0.0), leaf_data(0));
        let b = tree.create_leaf(unit_box_at(10.0, 0.0), leaf_data(1));
        let c = tree.create_leaf(unit_box_at(0.5, 0.5), leaf_data(2));

        let mut hits = Vec::new();
        tree.query(&unit_box_at(0.0, 0.0), |id| {
            hits.push(id);
            true
        });
        assert!(hits.contains(&a));
        assert!(hits.contains(&c));
        assert!(!hits.contains(&b));

        tree.destroy_leaf(a);
        tree.destroy_leaf(b);
        tree.destroy_leaf(c);
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn balance_stays_bounded_under_sorted_insertion() {
        let mut tree = DynamicTree::new(4);
        let mut leaves = Vec::new();
        for i in 0..64 {
            leaves.push(tree.create_leaf(unit_box_at(i as f32 * 1.5, 0.0), leaf_data(i)));
        }
        assert!(tree.validate_structure(tree.root()));
        assert!(tree.validate_metrics(tree.root()));
        assert!(tree.max_balance() <= 1);
        // A degenerate insertion order would otherwise produce height 64.
        assert!(tree.height() < 16);
        for leaf in leaves {
            tree.destroy_leaf(leaf);
        }
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn update_leaf_only_moves_when_out_of_fat_bounds() {
        let mut tree = DynamicTree::new(4);
        let tight = unit_box_at(0.0, 0.0);
        let id = tree.create_leaf(tight.fattened(0.5), leaf_data(0));

        // Small wiggle stays inside the fattened bounds.
        let nudged = tight.translated(Vec2::splat(0.1));
        assert!(!tree.update_leaf(id, nudged, Vec2::ZERO, 0.5));

        // A real move forces re-insertion.
        let moved = tight.translated(Vec2::new(6.0, 0.0));
        assert!(tree.update_leaf(id, moved, Vec2::ZERO, 0.5));
        assert!(tree.get_aabb(id).unwrap().contains(&moved));
    }

    #[test]
    fn ray_cast_on_empty_tree_returns_no_hits() {
        let tree = DynamicTree::new(4);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let mut count = 0;
        tree.ray_cast(&input, |input, _| {
            count += 1;
            input.max_fraction
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn ray_cast_visits_leaves_on_the_segment() {
        let mut tree = DynamicTree::new(4);
        tree.create_leaf(unit_box_at(2.0, -0.5), leaf_data(0));
        tree.create_leaf(unit_box_at(5.0, -0.5), leaf_data(1));
        tree.create_leaf(unit_box_at(2.0, 10.0), leaf_data(2));

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let mut visited = Vec::new();
        tree.ray_cast(&input, |input, id| {
            visited.push(tree.get_leaf_data(id).unwrap().body.index());
            input.max_fraction
        });
        visited.sort_unstable();
        assert_eq!(visited, vec![0, 1]);
    }

    #[test]
    fn ray_cast_stops_when_callback_returns_zero() {
        let mut tree = DynamicTree::new(4);
        for i in 0..8 {
            tree.create_leaf(unit_box_at(i as f32 * 2.0, -0.5), leaf_data(i));
        }
        let input = RayCastInput {
            p1: Vec2::new(-1.0, 0.0),
            p2: Vec2::new(20.0, 0.0),
            max_fraction: 1.0,
        };
        let mut count = 0;
        tree.ray_cast(&input, |_, _| {
            count += 1;
            0.0
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn clear_returns_to_empty_state() {
        let mut tree = DynamicTree::new(4);
        for i in 0..10 {
            tree.create_leaf(unit_box_at(i as f32, 0.0), leaf_data(i));
        }
        tree.clear();
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.leaf_count(), 0);
        assert_eq!(tree.height(), 0);
        let mut any = false;
        tree.query(&unit_box_at(0.0, 0.0), |_| {
            any = true;
            true
        });
        assert!(!any);
    }
}
