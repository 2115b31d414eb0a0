use approx::assert_relative_eq;
use glam::Vec2;
use kinetic2d::config::LINEAR_SLOP;
use kinetic2d::*;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn free_fall_matches_gravity() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();
    let shape = world.create_shape(Shape::disk(0.5).density(1.0)).unwrap();
    let body = world
        .create_body(Body::builder().position(Vec2::new(0.0, 100.0)).build())
        .unwrap();
    world.attach(body, shape).unwrap();

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }
    let v = world.body(body).unwrap().velocity.linear;
    // One second of 10 m/s² gravity.
    assert_relative_eq!(v.y, -10.0, max_relative = 0.02);
}

#[test]
fn resting_box_goes_to_sleep() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();

    let ground_shape = world
        .create_shape(Shape::edge(Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0)))
        .unwrap();
    let ground = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    world.attach(ground, ground_shape).unwrap();

    let box_shape = world.create_shape(Shape::rect(0.5, 0.5).density(1.0)).unwrap();
    let falling = world
        .create_body(Body::builder().position(Vec2::new(0.0, 0.5)).build())
        .unwrap();
    world.attach(falling, box_shape).unwrap();

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }

    let body = world.body(falling).unwrap();
    assert!(
        body.velocity.linear.length() < conf.linear_sleep_tolerance,
        "still moving at {:?}",
        body.velocity.linear
    );
    assert!(!body.is_awake, "body never fell asleep");
    assert_eq!(body.velocity.linear, Vec2::ZERO);
    assert_eq!(body.velocity.angular, 0.0);
    // Bottom face stays near the ground line.
    let bottom = body.transform.p.y - 0.5;
    assert!(bottom.abs() <= 4.0 * LINEAR_SLOP, "bottom = {bottom}");
}

#[test]
fn sleeping_body_wakes_on_impulse() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();
    let ground_shape = world
        .create_shape(Shape::edge(Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0)))
        .unwrap();
    let ground = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    world.attach(ground, ground_shape).unwrap();
    let box_shape = world.create_shape(Shape::rect(0.5, 0.5).density(1.0)).unwrap();
    let body = world
        .create_body(Body::builder().position(Vec2::new(0.0, 0.5)).build())
        .unwrap();
    world.attach(body, box_shape).unwrap();

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }
    assert!(!world.body(body).unwrap().is_awake);

    let center = world.body(body).unwrap().world_center();
    world
        .apply_linear_impulse(body, Vec2::new(0.5, 0.0), center)
        .unwrap();
    assert!(world.body(body).unwrap().is_awake);
}

#[test]
fn destroy_body_cascades_to_contacts_joints_and_proxies() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::rect(0.5, 0.5)).unwrap();

    let a = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    let b = world
        .create_body(Body::builder().position(Vec2::new(0.8, 0.0)).build())
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();

    let joint = world
        .create_joint(Joint::Distance(DistanceJoint::new(
            a,
            b,
            Vec2::ZERO,
            Vec2::ZERO,
            0.8,
        )))
        .unwrap();

    world.step(&StepConf::default()).unwrap();
    assert!(world.contact_count() > 0 || world.joint_count() == 1);

    let destroyed_joints = Rc::new(RefCell::new(Vec::new()));
    let sink = destroyed_joints.clone();
    world.on_joint_destroyed(move |id| sink.borrow_mut().push(id));

    let leaves_before = world.tree().leaf_count();
    world.destroy_body(a).unwrap();

    // The joint went with its body, with notification.
    assert_eq!(world.joint_count(), 0);
    assert!(world.joint(joint).is_none());
    assert_eq!(destroyed_joints.borrow().as_slice(), &[joint]);

    // No live contact references the destroyed body.
    for id in world.contact_ids() {
        let contact = world.contact(id).unwrap();
        assert_ne!(contact.body_a, a);
        assert_ne!(contact.body_b, a);
    }

    // The body's proxy left the tree.
    assert_eq!(world.tree().leaf_count(), leaves_before - 1);

    // The survivor still steps fine.
    world.step(&StepConf::default()).unwrap();
    assert!(world.body(b).is_some());
}

#[test]
fn set_transform_round_trips() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let body = world.create_body(Body::builder().build()).unwrap();

    world
        .set_transform(body, Vec2::new(3.5, -2.0), 0.7)
        .unwrap();
    let xf = world.transformation(body).unwrap();
    assert!((xf.p - Vec2::new(3.5, -2.0)).length() < 1e-6);
    assert!((xf.q.angle() - 0.7).abs() < 1e-5);
}

#[test]
fn linear_impulse_at_center_only_changes_linear_velocity() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::disk(0.5).density(1.0)).unwrap();
    let body = world.create_body(Body::builder().build()).unwrap();
    world.attach(body, shape).unwrap();

    let mass = std::f32::consts::PI * 0.25;
    let center = world.body(body).unwrap().world_center();
    world
        .apply_linear_impulse(body, Vec2::new(2.0, 0.0), center)
        .unwrap();

    let body = world.body(body).unwrap();
    assert!((body.velocity.linear.x - 2.0 / mass).abs() < 1e-4);
    assert_eq!(body.velocity.angular, 0.0);
}

#[test]
fn static_bodies_never_move() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();
    let shape = world.create_shape(Shape::rect(1.0, 1.0)).unwrap();
    let body = world
        .create_body(
            Body::builder()
                .body_type(BodyType::Static)
                .position(Vec2::new(0.0, 5.0))
                .build(),
        )
        .unwrap();
    world.attach(body, shape).unwrap();

    for _ in 0..30 {
        world.step(&StepConf::default()).unwrap();
    }
    let b = world.body(body).unwrap();
    assert_eq!(b.inv_mass, 0.0);
    assert_eq!(b.inv_inertia, 0.0);
    assert!((b.transform.p - Vec2::new(0.0, 5.0)).length() < 1e-6);
}

#[test]
fn switching_to_static_clears_velocity_and_contacts() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::rect(0.5, 0.5)).unwrap();
    let a = world
        .create_body(
            Body::builder()
                .position(Vec2::ZERO)
                .linear_velocity(Vec2::new(1.0, 0.0))
                .build(),
        )
        .unwrap();
    let b = world
        .create_body(Body::builder().position(Vec2::new(0.8, 0.0)).build())
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();
    world.step(&StepConf::default()).unwrap();
    assert!(world.contact_count() > 0);

    world.set_type(a, BodyType::Static).unwrap();
    let body = world.body(a).unwrap();
    assert_eq!(body.velocity, Velocity::default());
    assert!(body.contacts.is_empty());
    assert_eq!(body.body_type, BodyType::Static);
}

#[test]
fn shift_origin_translates_everything() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::disk(0.5)).unwrap();
    let body = world
        .create_body(Body::builder().position(Vec2::new(5.0, 1.0)).build())
        .unwrap();
    world.attach(body, shape).unwrap();
    world.step(&StepConf::default()).unwrap();

    world.shift_origin(Vec2::new(5.0, 0.0)).unwrap();
    let xf = world.transformation(body).unwrap();
    assert!((xf.p - Vec2::new(0.0, 1.0)).length() < 1e-5);

    // The tree moved with the bodies.
    let hit = world.ray_cast_closest(&RayCastInput::new(
        Vec2::new(-3.0, 1.0),
        Vec2::new(3.0, 1.0),
    ));
    assert!(hit.is_some());
    assert_eq!(hit.unwrap().body, body);
}

#[test]
fn begin_and_end_contact_events_fire() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::rect(0.5, 0.5)).unwrap();
    let a = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    let b = world
        .create_body(
            Body::builder()
                .position(Vec2::new(0.9, 0.0))
                .linear_velocity(Vec2::new(5.0, 0.0))
                .build(),
        )
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();

    let begins = Rc::new(RefCell::new(0));
    let ends = Rc::new(RefCell::new(0));
    let b1 = begins.clone();
    let e1 = ends.clone();
    world.on_begin_contact(move |_| *b1.borrow_mut() += 1);
    world.on_end_contact(move |_| *e1.borrow_mut() += 1);

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }
    assert!(*begins.borrow() >= 1, "begin-contact never fired");
    assert!(*ends.borrow() >= 1, "end-contact never fired");
}

#[test]
fn invalid_ids_are_rejected() {
    let mut world = World::builder().build();
    let bogus = EntityId::from_index(999);
    assert_eq!(
        world.destroy_body(bogus),
        Err(WorldError::OutOfRange("body id"))
    );
    assert_eq!(
        world.apply_torque(bogus, 1.0),
        Err(WorldError::OutOfRange("body id"))
    );
    assert!(world.body(bogus).is_none());
}

#[test]
fn degenerate_shapes_are_rejected() {
    let mut world = World::builder().build();
    assert_eq!(
        world.create_shape(Shape::disk(0.0)),
        Err(WorldError::InvalidArgument("degenerate shape geometry"))
    );
    let tiny = Shape::new(ShapeGeometry::Polygon(Polygon::new(&[
        Vec2::ZERO,
        Vec2::new(1.0, 0.0),
    ])));
    assert!(world.create_shape(tiny).is_err());
}

#[test]
fn zero_dt_performs_only_pair_maintenance() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();
    let shape = world.create_shape(Shape::disk(0.5)).unwrap();
    let body = world
        .create_body(Body::builder().position(Vec2::new(0.0, 3.0)).build())
        .unwrap();
    world.attach(body, shape).unwrap();

    let conf = StepConf::default().with_time(0.0);
    let before = world.transformation(body).unwrap().p;
    world.step(&conf).unwrap();
    let after = world.transformation(body).unwrap().p;
    assert_eq!(before, after);
    assert_eq!(world.body(body).unwrap().velocity.linear, Vec2::ZERO);
}
