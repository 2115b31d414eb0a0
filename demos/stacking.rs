//! Builds a pyramid of boxes and reports island and sleep statistics as
//! the stack settles.

use glam::Vec2;
use kinetic2d::*;

fn main() {
    let mut world = World::builder().gravity(Vec2::new(0.0, -10.0)).build();

    let ground_shape = world
        .create_shape(Shape::edge(Vec2::new(-40.0, 0.0), Vec2::new(40.0, 0.0)))
        .expect("ground shape");
    let ground = world
        .create_body(Body::builder().body_type(BodyType::Static).build())
        .expect("ground body");
    world.attach(ground, ground_shape).expect("attach ground");

    let box_shape = world
        .create_shape(Shape::rect(0.5, 0.5).density(1.0).friction(0.6))
        .expect("box shape");

    let base = 10;
    for row in 0..base {
        for col in 0..(base - row) {
            let x = (col as f32 - (base - row) as f32 * 0.5) * 1.05;
            let y = 0.55 + row as f32 * 1.02;
            let body = world
                .create_body(Body::builder().position(Vec2::new(x, y)).build())
                .expect("box body");
            world.attach(body, box_shape).expect("attach box");
        }
    }

    let conf = StepConf::default();
    let mut total_slept = 0;
    for frame in 0..300 {
        let stats = world.step(&conf).expect("step");
        total_slept += stats.reg.bodies_slept;
        if frame % 30 == 0 {
            println!(
                "frame {frame:3}: islands={:2} contacts={:3} slept={total_slept}",
                stats.reg.islands_found,
                world.contact_count(),
            );
        }
    }
    println!("final contacts: {}", world.contact_count());
}
