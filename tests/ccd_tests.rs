use glam::Vec2;
use kinetic2d::config::LINEAR_SLOP;
use kinetic2d::*;

fn bullet_world(do_toi: bool) -> (World, EntityId, StepConf) {
    let mut world = World::builder().gravity(Vec2::ZERO).build();

    let wall_shape = world
        .create_shape(Shape::edge(Vec2::new(10.0, -5.0), Vec2::new(10.0, 5.0)))
        .unwrap();
    let wall = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    world.attach(wall, wall_shape).unwrap();

    let bullet_shape = world.create_shape(Shape::disk(0.5).density(1.0)).unwrap();
    let bullet = world
        .create_body(
            Body::builder()
                .position(Vec2::ZERO)
                .linear_velocity(Vec2::new(400.0, 0.0))
                .bullet(true)
                .build(),
        )
        .unwrap();
    world.attach(bullet, bullet_shape).unwrap();

    let conf = StepConf {
        do_toi,
        ..StepConf::default()
    };
    (world, bullet, conf)
}

#[test]
fn bullet_does_not_tunnel_with_toi() {
    let (mut world, bullet, conf) = bullet_world(true);
    for _ in 0..6 {
        world.step(&conf).unwrap();
    }
    let x = world.transformation(bullet).unwrap().p.x;
    assert!(
        x <= 10.0 - 0.5 + 2.0 * LINEAR_SLOP,
        "bullet tunneled to x = {x}"
    );
    // It actually reached the wall rather than stopping early.
    assert!(x > 8.0, "bullet stopped short at x = {x}");
}

#[test]
fn bullet_tunnels_without_toi() {
    let (mut world, bullet, conf) = bullet_world(false);
    for _ in 0..6 {
        world.step(&conf).unwrap();
    }
    let x = world.transformation(bullet).unwrap().p.x;
    assert!(x > 10.0, "discrete stepping should tunnel, x = {x}");
}

#[test]
fn toi_stats_record_substep_work() {
    let (mut world, _, conf) = bullet_world(true);
    let mut any_toi_updates = false;
    for _ in 0..6 {
        let stats = world.step(&conf).unwrap();
        if stats.toi.contacts_updated_toi > 0 || stats.toi.islands_found > 0 {
            any_toi_updates = true;
        }
    }
    assert!(any_toi_updates, "CCD never engaged for a 400 m/s bullet");
}

#[test]
fn approaching_impenetrable_disks_stop_at_contact() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let shape = world.create_shape(Shape::disk(1.0).density(1.0)).unwrap();
    let a = world
        .create_body(
            Body::builder()
                .position(Vec2::new(-2.0, 0.0))
                .linear_velocity(Vec2::new(1.0, 0.0))
                .bullet(true)
                .build(),
        )
        .unwrap();
    let b = world
        .create_body(
            Body::builder()
                .position(Vec2::new(2.0, 0.0))
                .linear_velocity(Vec2::new(-1.0, 0.0))
                .bullet(true)
                .build(),
        )
        .unwrap();
    world.attach(a, shape).unwrap();
    world.attach(b, shape).unwrap();

    let conf = StepConf::default();
    for _ in 0..90 {
        world.step(&conf).unwrap();
    }

    // Surfaces end up separated by no more than the allowed overlap.
    let xa = world.transformation(a).unwrap().p.x;
    let xb = world.transformation(b).unwrap().p.x;
    let gap = (xb - xa) - 2.0;
    assert!(
        gap >= -(conf.target_depth + 2.0 * LINEAR_SLOP),
        "disks overlap too deeply: gap = {gap}"
    );
    // Momentum symmetric: the pair stays centered.
    assert!((xa + xb).abs() < 1e-3);
}

#[test]
fn fast_body_without_bullet_flag_is_not_substepped() {
    let mut world = World::builder().gravity(Vec2::ZERO).build();
    let wall_shape = world
        .create_shape(Shape::edge(Vec2::new(10.0, -5.0), Vec2::new(10.0, 5.0)))
        .unwrap();
    let wall = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    world.attach(wall, wall_shape).unwrap();

    let shape = world.create_shape(Shape::disk(0.5)).unwrap();
    let body = world
        .create_body(
            Body::builder()
                .position(Vec2::ZERO)
                .linear_velocity(Vec2::new(400.0, 0.0))
                .bullet(false)
                .build(),
        )
        .unwrap();
    world.attach(body, shape).unwrap();

    for _ in 0..6 {
        world.step(&StepConf::default()).unwrap();
    }
    let x = world.transformation(body).unwrap().p.x;
    assert!(x > 10.0, "non-bullet body should pass the thin wall, x = {x}");
}
