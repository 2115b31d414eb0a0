use glam::Vec2;
use kinetic2d::*;

fn zero_gravity_world() -> World {
    World::builder().gravity(Vec2::ZERO).build()
}

#[test]
fn revolute_chain_swings_under_gravity() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();
    let disk = world.create_shape(Shape::disk(0.45).density(1.0)).unwrap();

    let anchor = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();

    let mut links = Vec::new();
    for i in 0..10 {
        let body = world
            .create_body(
                Body::builder()
                    .position(Vec2::new(1.0 + i as f32, 0.0))
                    .build(),
            )
            .unwrap();
        world.attach(body, disk).unwrap();
        links.push(body);
    }

    // Pin the first link to the world origin.
    let mut joints = Vec::new();
    joints.push(
        world
            .create_joint(Joint::Revolute(RevoluteJoint::new(
                anchor,
                links[0],
                Vec2::ZERO,
                Vec2::new(-1.0, 0.0),
            )))
            .unwrap(),
    );
    for i in 0..9 {
        joints.push(
            world
                .create_joint(Joint::Revolute(RevoluteJoint::new(
                    links[i],
                    links[i + 1],
                    Vec2::new(0.5, 0.0),
                    Vec2::new(-0.5, 0.0),
                )))
                .unwrap(),
        );
    }

    let conf = StepConf::default();
    for _ in 0..10 {
        world.step(&conf).unwrap();
    }

    for id in &joints {
        assert_eq!(world.joint(*id).unwrap().joint_type(), JointType::Revolute);
        assert!(!world.joint(*id).unwrap().collide_connected());
    }
    // Neighbouring links overlap in the broad phase but the joints forbid
    // their contacts.
    assert_eq!(world.contact_count(), 0);

    // The chain has started to swing downward.
    let tail_y = world.transformation(links[9]).unwrap().p.y;
    assert!(tail_y < -0.01, "tail did not fall: y = {tail_y}");

    // The pin holds: the first link's inner anchor stays at the origin.
    let xf = world.transformation(links[0]).unwrap();
    let pin = xf.transform_point(Vec2::new(-1.0, 0.0));
    assert!(pin.length() < 0.05, "pin drifted to {pin:?}");
}

#[test]
fn distance_joint_keeps_its_length() {
    let mut world = zero_gravity_world();
    let disk = world.create_shape(Shape::disk(0.1).density(1.0)).unwrap();
    let a = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    let b = world
        .create_body(
            Body::builder()
                .position(Vec2::new(2.0, 0.0))
                .linear_velocity(Vec2::new(3.0, 0.0))
                .build(),
        )
        .unwrap();
    world.attach(a, disk).unwrap();
    world.attach(b, disk).unwrap();

    world
        .create_joint(Joint::Distance(DistanceJoint::new(
            a,
            b,
            Vec2::ZERO,
            Vec2::ZERO,
            2.0,
        )))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }
    let pa = world.body(a).unwrap().world_center();
    let pb = world.body(b).unwrap().world_center();
    assert!(
        (pa.distance(pb) - 2.0).abs() < 0.02,
        "length drifted to {}",
        pa.distance(pb)
    );
}

#[test]
fn prismatic_joint_limits_travel() {
    let mut world = zero_gravity_world();
    let shape = world.create_shape(Shape::rect(0.2, 0.2).density(1.0)).unwrap();
    let ground = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    let slider = world
        .create_body(
            Body::builder()
                .position(Vec2::ZERO)
                .linear_velocity(Vec2::new(4.0, 2.0))
                .build(),
        )
        .unwrap();
    world.attach(slider, shape).unwrap();

    let mut joint = PrismaticJoint::new(ground, slider, Vec2::ZERO, Vec2::ZERO, Vec2::X);
    joint.enable_limit = true;
    joint.lower_translation = -1.0;
    joint.upper_translation = 1.0;
    world.create_joint(Joint::Prismatic(joint)).unwrap();

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }

    let p = world.transformation(slider).unwrap().p;
    // Motion restricted to the x axis, clamped to the limits.
    assert!(p.y.abs() < 0.02, "slider left the axis: {p:?}");
    assert!(p.x <= 1.0 + 0.02, "upper limit violated: {p:?}");
    assert!(p.x >= -1.0 - 0.02, "lower limit violated: {p:?}");
}

#[test]
fn revolute_motor_spins_the_wheel() {
    let mut world = zero_gravity_world();
    let shape = world.create_shape(Shape::disk(0.5).density(1.0)).unwrap();
    let ground = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    let wheel = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    world.attach(wheel, shape).unwrap();

    let mut joint = RevoluteJoint::new(ground, wheel, Vec2::ZERO, Vec2::ZERO);
    joint.enable_motor = true;
    joint.motor_speed = 4.0;
    joint.max_motor_torque = 100.0;
    world.create_joint(Joint::Revolute(joint)).unwrap();

    let conf = StepConf::default();
    for _ in 0..30 {
        world.step(&conf).unwrap();
    }
    let w = world.body(wheel).unwrap().velocity.angular;
    assert!((w - 4.0).abs() < 0.1, "motor speed not reached: {w}");
}

#[test]
fn rope_joint_caps_separation() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();
    let shape = world.create_shape(Shape::disk(0.1).density(1.0)).unwrap();
    let anchor = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    let weight = world
        .create_body(Body::builder().position(Vec2::new(0.0, -1.0)).build())
        .unwrap();
    world.attach(weight, shape).unwrap();

    world
        .create_joint(Joint::Rope(RopeJoint::new(
            anchor,
            weight,
            Vec2::ZERO,
            Vec2::ZERO,
            3.0,
        )))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..120 {
        world.step(&conf).unwrap();
    }
    let d = world.body(weight).unwrap().world_center().length();
    assert!(d <= 3.0 + 0.05, "rope overstretched: {d}");
}

#[test]
fn weld_joint_locks_relative_motion() {
    let mut world = zero_gravity_world();
    let shape = world.create_shape(Shape::rect(0.3, 0.3).density(1.0)).unwrap();
    let a = world
        .create_body(
            Body::builder()
                .position(Vec2::ZERO)
                .linear_velocity(Vec2::new(1.0, 0.5))
                .build(),
        )
        .unwrap();
    let b = world
        .create_body(Body::builder().position(Vec2::new(1.0, 0.0)).build())
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();

    world
        .create_joint(Joint::Weld(WeldJoint::new(
            a,
            b,
            Vec2::new(0.5, 0.0),
            Vec2::new(-0.5, 0.0),
        )))
        .unwrap();

    let conf = StepConf::default();
    for _ in 0..60 {
        world.step(&conf).unwrap();
    }
    let pa = world.body(a).unwrap().world_center();
    let pb = world.body(b).unwrap().world_center();
    assert!(
        (pa.distance(pb) - 1.0).abs() < 0.02,
        "weld separation drifted: {}",
        pa.distance(pb)
    );
    let angle_a = world.body(a).unwrap().angle();
    let angle_b = world.body(b).unwrap().angle();
    assert!((angle_a - angle_b).abs() < 0.02);
}

#[test]
fn target_joint_drags_body_toward_target() {
    let mut world = zero_gravity_world();
    let shape = world.create_shape(Shape::disk(0.3).density(1.0)).unwrap();
    let body = world
        .create_body(Body::builder().position(Vec2::ZERO).build())
        .unwrap();
    world.attach(body, shape).unwrap();

    let mut joint = TargetJoint::new(body, Vec2::new(3.0, 2.0), Vec2::ZERO);
    joint.max_force = 1000.0;
    world.create_joint(Joint::Target(joint)).unwrap();

    let conf = StepConf::default();
    for _ in 0..120 {
        world.step(&conf).unwrap();
    }
    let p = world.body(body).unwrap().world_center();
    assert!(
        p.distance(Vec2::new(3.0, 2.0)) < 0.2,
        "body never reached the target: {p:?}"
    );
}

#[test]
fn destroying_a_joint_restores_collision() {
    let mut world = zero_gravity_world();
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
        .create_joint(Joint::Revolute(RevoluteJoint::new(
            a,
            b,
            Vec2::new(0.4, 0.0),
            Vec2::new(-0.4, 0.0),
        )))
        .unwrap();

    world.step(&StepConf::default()).unwrap();
    assert_eq!(world.contact_count(), 0, "joint should suppress the pair");

    world.destroy_joint(joint).unwrap();
    // Move one body far enough for its proxy to re-enter pair search.
    world.set_transform(b, Vec2::new(0.5, 0.0), 0.0).unwrap();
    world.step(&StepConf::default()).unwrap();
    assert_eq!(world.contact_count(), 1, "pair should come back");
}

#[test]
fn gear_joint_couples_two_revolutes() {
    let mut world = zero_gravity_world();
    let shape = world.create_shape(Shape::disk(0.5).density(1.0)).unwrap();
    let ground = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    let wheel_a = world
        .create_body(Body::builder().position(Vec2::new(-1.0, 0.0)).build())
        .unwrap();
    let wheel_b = world
        .create_body(Body::builder().position(Vec2::new(1.0, 0.0)).build())
        .unwrap();
    world.attach(wheel_a, shape).unwrap();
    world.attach(wheel_b, shape).unwrap();

    let j1 = world
        .create_joint(Joint::Revolute(RevoluteJoint::new(
            ground,
            wheel_a,
            Vec2::new(-1.0, 0.0),
            Vec2::ZERO,
        )))
        .unwrap();
    let j2 = world
        .create_joint(Joint::Revolute(RevoluteJoint::new(
            ground,
            wheel_b,
            Vec2::new(1.0, 0.0),
            Vec2::ZERO,
        )))
        .unwrap();

    let gear = {
        let joint1 = world.joint(j1).unwrap();
        let joint2 = world.joint(j2).unwrap();
        GearJoint::from_joints(joint1, joint2, 1.0).unwrap()
    };
    world.create_joint(Joint::Gear(gear)).unwrap();

    world.apply_angular_impulse(wheel_a, 2.0).unwrap();
    let conf = StepConf::default();
    for _ in 0..30 {
        world.step(&conf).unwrap();
    }
    let wa = world.body(wheel_a).unwrap().velocity.angular;
    let wb = world.body(wheel_b).unwrap().velocity.angular;
    // Ratio-1 gearing keeps coord1 + coord2 constant, so the wheels spin
    // in opposite directions at equal speed.
    assert!((wa + wb).abs() < 0.05, "gear constraint violated: {wa} vs {wb}");
    assert!(wa.abs() > 0.1, "wheels never spun");
}
