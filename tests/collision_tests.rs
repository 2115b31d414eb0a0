use glam::Vec2;
use kinetic2d::collision::broadphase::LeafData;
use kinetic2d::*;

fn varied_box(i: usize) -> Aabb {
    let x = (i % 20) as f32 * 2.5;
    let y = (i / 20) as f32 * 3.0;
    let w = 0.5 + (i % 3) as f32 * 0.4;
    Aabb::new(Vec2::new(x, y), Vec2::new(x + w, y + w))
}

#[test]
fn dynamic_tree_churn_stays_valid() {
    let mut tree = DynamicTree::new(16);
    let mut leaves = Vec::new();

    for i in 0..200 {
        let data = LeafData {
            body: EntityId::from_index(i as u32),
            shape: EntityId::from_index(i as u32),
            child_index: 0,
        };
        leaves.push((tree.create_leaf(varied_box(i), data), varied_box(i)));
        assert!(tree.validate_structure(tree.root()));
        assert!(tree.validate_metrics(tree.root()));
    }
    assert_eq!(tree.leaf_count(), 200);

    // Translate every leaf by (+6, 0).
    for (leaf, aabb) in leaves.iter_mut() {
        *aabb = aabb.translated(Vec2::new(6.0, 0.0));
        tree.update_leaf(*leaf, *aabb, Vec2::ZERO, 0.1);
        assert!(tree.validate_structure(tree.root()));
        assert!(tree.validate_metrics(tree.root()));
    }

    // Fatten every leaf by 0.5.
    for (leaf, aabb) in leaves.iter_mut() {
        *aabb = aabb.fattened(0.5);
        tree.update_leaf(*leaf, *aabb, Vec2::ZERO, 0.1);
        assert!(tree.validate_structure(tree.root()));
        assert!(tree.validate_metrics(tree.root()));
    }

    for (leaf, _) in leaves {
        tree.destroy_leaf(leaf);
    }
    assert_eq!(tree.node_count(), 0);
    assert_eq!(tree.height(), 0);
}

#[test]
fn overlapping_boxes_form_a_touching_contact() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::rect(0.5, 0.5)).unwrap();

    let a = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    let b = world
        .create_body(Body::builder().position(Vec2::new(0.9, 0.0)).build())
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();

    let stats = world.step(&StepConf::default()).unwrap();
    assert!(stats.pre.contacts_added >= 1);
    assert_eq!(world.contact_count(), 1);

    let contact_id = world.contact_ids()[0];
    let contact = world.contact(contact_id).unwrap();
    assert!(contact.is_touching);
    assert_eq!(contact.manifold.point_count(), 2);
    // Ordering invariant over the pair.
    assert!(contact.body_a.index() <= contact.body_b.index());
}

#[test]
fn distant_shapes_produce_no_pairs() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::disk(0.2)).unwrap();

    let a = world
        .create_body(Body::builder().position(Vec2::new(-1.0, 0.0)).build())
        .unwrap();
    let b = world
        .create_body(Body::builder().position(Vec2::new(1.0, 0.0)).build())
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();

    let before_a = world.transformation(a).unwrap().p;
    let stats = world.step(&StepConf::default()).unwrap();
    assert_eq!(stats.pre.contacts_added, 0);
    assert_eq!(stats.reg.contacts_added, 0);
    assert_eq!(world.contact_count(), 0);
    // No gravity and no contacts: nothing moves.
    let after_a = world.transformation(a).unwrap().p;
    assert!((before_a - after_a).length() < 1e-6);
}

#[test]
fn filters_suppress_contacts() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let filtered = Shape::rect(0.5, 0.5).with_filter(Filter {
        category: 0b10,
        mask: 0b01,
        group: 0,
    });
    // Mask matches nothing in category 0b10.
    let shape = world.create_shape(filtered).unwrap();

    let a = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    let b = world
        .create_body(Body::builder().position(Vec2::new(0.5, 0.0)).build())
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();

    world.step(&StepConf::default()).unwrap();
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn sensors_report_overlap_without_manifolds() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let solid = world.create_shape(Shape::rect(0.5, 0.5)).unwrap();
    let sensor = world
        .create_shape(Shape::rect(0.5, 0.5).sensor(true))
        .unwrap();

    let a = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    let b = world
        .create_body(Body::builder().position(Vec2::new(0.4, 0.0)).build())
        .unwrap();
    world.attach(a, solid).unwrap();
    world.attach(b, sensor).unwrap();

    world.step(&StepConf::default()).unwrap();
    assert_eq!(world.contact_count(), 1);
    let contact = world.contact(world.contact_ids()[0]).unwrap();
    assert!(contact.is_sensor);
    assert!(contact.is_touching);
    assert_eq!(contact.manifold.point_count(), 0);
}

#[test]
fn query_aabb_finds_attached_children() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::disk(0.5)).unwrap();
    let body = world
        .create_body(Body::builder().position(Vec2::new(3.0, 3.0)).build())
        .unwrap();
    world.attach(body, shape).unwrap();
    world.step(&StepConf::default()).unwrap();

    let mut hits = Vec::new();
    world.query_aabb(
        &Aabb::new(Vec2::new(2.0, 2.0), Vec2::new(4.0, 4.0)),
        |b, s, child| {
            hits.push((b, s, child));
            true
        },
    );
    assert_eq!(hits, vec![(body, shape, 0)]);

    let mut far_hits = 0;
    world.query_aabb(
        &Aabb::new(Vec2::new(40.0, 40.0), Vec2::new(41.0, 41.0)),
        |_, _, _| {
            far_hits += 1;
            true
        },
    );
    assert_eq!(far_hits, 0);
}
