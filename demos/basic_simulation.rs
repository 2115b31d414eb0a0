//! Drops a bouncy disk onto a static floor and prints its trajectory.

use glam::Vec2;
use kinetic2d::*;

fn main() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -9.81)).build();

    let floor_shape = world
        .create_shape(Shape::edge(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0)))
        .expect("floor shape");
    let floor = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .expect("floor body");
    world.attach(floor, floor_shape).expect("attach floor");

    let ball_shape = world
        .create_shape(Shape::disk(0.5).density(1.0).restitution(0.5))
        .expect("ball shape");
    let ball = world
        .create_body(Body::builder().position(Vec2::new(0.0, 8.0)).build())
        .expect("ball body");
    world.attach(ball, ball_shape).expect("attach ball");

    let conf = StepConf::default();
    for frame in 0..180 {
        world.step(&conf).expect("step");
        if frame % 15 == 0 {
            let p = world.transformation(ball).unwrap().p;
            let v = world.body(ball).unwrap().velocity.linear;
            println!(
                "t={:5.2}s  y={:6.3}  vy={:6.3}",
                frame as f32 / 60.0,
                p.y,
                v.y
            );
        }
    }
}
