//! Fires a fast impenetrable disk at a thin wall, showing the continuous
//! collision handling that keeps it from tunneling.

use glam::Vec2;
use kinetic2d::*;

fn main() {
    for do_toi in [true, false] {
        let mut world = World::builder().gravity(Vec2::ZERO).build();

        let wall_shape = world
            .create_shape(Shape::edge(Vec2::new(10.0, -5.0), Vec2::new(10.0, 5.0)))
            .expect("wall shape");
        let wall = world
            .create_body(Body::builder().body_type(BodyType::Static).build())
            .expect("wall body");
        world.attach(wall, wall_shape).expect("attach wall");

        let bullet_shape = world
            .create_shape(Shape::disk(0.5).density(1.0))
            .expect("bullet shape");
        let bullet = world
            .create_body(
                Body::builder()
                    .position(Vec2::ZERO)
                    .linear_velocity(Vec2::new(400.0, 0.0))
                    .bullet(true)
                    .build(),
            )
            .expect("bullet body");
        world.attach(bullet, bullet_shape).expect("attach bullet");

        let conf = StepConf {
            do_toi,
            ..StepConf::default()
        };
        for _ in 0..6 {
            world.step(&conf).expect("step");
        }
        let x = world.transformation(bullet).unwrap().p.x;
        println!(
            "do_toi={do_toi:5}: bullet ended at x = {x:7.3} ({})",
            if x <= 9.6 { "stopped by wall" } else { "tunneled" }
        );
    }
}
