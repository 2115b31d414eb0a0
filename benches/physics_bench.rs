use criterion::{criterion_group, criterion_main, Criterion};
use glam::Vec2;
use kinetic2d::*;

fn build_stack_world(columns: usize, rows: usize) -> World {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();

    let ground_shape = world
        .create_shape(Shape::edge(Vec2::new(-100.0, 0.0), Vec2::new(100.0, 0.0)))
        .unwrap();
    let ground = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .unwrap();
    world.attach(ground, ground_shape).unwrap();

    let box_shape = world
        .create_shape(Shape::rect(0.5, 0.5).density(1.0))
        .unwrap();
    for col in 0..columns {
        for row in 0..rows {
            let body = world
                .create_body(
                    Body::builder()
                        .position(Vec2::new(col as f32 * 3.0, 0.55 + row as f32 * 1.01))
                        .build(),
                )
                .unwrap();
            world.attach(body, box_shape).unwrap();
        }
    }
    world
}

fn bench_step(c: &mut Criterion) {
    c.bench_function("step_stacks_8x8", |b| {
        let mut world = build_stack_world(8, 8);
        let conf = StepConf::default();
        // Settle a little so contacts and islands exist.
        for _ in 0..10 {
            world.step(&conf).unwrap();
        }
        b.iter(|| {
            world.step(&conf).unwrap();
        });
    });
}

fn bench_broadphase(c: &mut Criterion) {
    c.bench_function("raycast_across_stacks", |b| {
        let mut world = build_stack_world(16, 4);
        let conf = StepConf::default();
        for _ in 0..5 {
            world.step(&conf).unwrap();
        }
        let input = RayCastInput::new(Vec2::new(-10.0, 1.0), Vec2::new(60.0, 1.0));
        b.iter(|| world.ray_cast_closest(&input));
    });
}

criterion_group!(benches, bench_step, bench_broadphase);
criterion_main!(benches);
