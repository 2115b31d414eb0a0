use glam::Vec2;
use kinetic2d::*;

fn world_with_targets() -> (World, EntityId, EntityId) {
    let mut world = World::builder().gravity(Vec2::ZERO).build();

    let disk = world.create_shape(Shape::disk(0.5)).unwrap();
    let near = world
        .create_body(Body::builder().position(Vec2::new(3.0, 0.0)).build())
        .unwrap();
    world.attach(near, disk).unwrap();

    let boxy = world.create_shape(Shape::rect(0.5, 0.5)).unwrap();
    let far = world
        .create_body(Body::builder().position(Vec2::new(7.0, 0.0)).build())
        .unwrap();
    world.attach(far, boxy).unwrap();

    world.step(&StepConf::default().with_time(0.0)).unwrap();
    (world, near, far)
}

#[test]
fn closest_hit_wins() {
    let (world, near, _) = world_with_targets();
    let hit = world
        .ray_cast_closest(&RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0)))
        .expect("ray should hit something");
    assert_eq!(hit.body, near);
    assert!((hit.fraction - 0.25).abs() < 1e-4, "fraction {}", hit.fraction);
    assert!((hit.point.x - 2.5).abs() < 1e-3);
    assert!(hit.normal.x < -0.99);
}

#[test]
fn callback_sees_every_shape_on_the_ray() {
    let (world, _, _) = world_with_targets();
    let mut count = 0;
    world.ray_cast(
        &RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0)),
        |hit| {
            count += 1;
            // Keep scanning to the end of the ray.
            let _ = hit;
            1.0
        },
    );
    assert_eq!(count, 2);
}

#[test]
fn zero_return_stops_the_cast() {
    let (world, _, _) = world_with_targets();
    let mut count = 0;
    world.ray_cast(
        &RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0)),
        |_| {
            count += 1;
            0.0
        },
    );
    assert_eq!(count, 1);
}

#[test]
fn empty_world_has_no_hits() {
    let world = World::builder().build();
    assert!(world
        .ray_cast_closest(&RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0)))
        .is_none());
}

#[test]
fn misses_report_nothing() {
    let (world, _, _) = world_with_targets();
    assert!(world
        .ray_cast_closest(&RayCastInput::new(
            Vec2::new(0.0, 5.0),
            Vec2::new(10.0, 5.0),
        ))
        .is_none());
}

#[test]
fn max_fraction_clips_the_segment() {
    let (world, _, far) = world_with_targets();
    let input = RayCastInput {
        p1: Vec2::new(5.0, 0.0),
        p2: Vec2::new(10.0, 0.0),
        max_fraction: 1.0,
    };
    let hit = world.ray_cast_closest(&input).unwrap();
    assert_eq!(hit.body, far);

    let clipped = RayCastInput {
        max_fraction: 0.2,
        ..input
    };
    assert!(world.ray_cast_closest(&clipped).is_none());
}
