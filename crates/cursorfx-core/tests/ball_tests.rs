// Ball engine: leader tracking, wall containment and leader sizing.

use cursorfx_core::ball::FIXED_STEP;
use cursorfx_core::{BallConfig, BallEngine};
use proptest::prelude::*;

fn config(count: usize) -> BallConfig {
    BallConfig {
        count,
        ..BallConfig::default()
    }
}

#[test]
fn leader_snaps_to_projected_pointer() {
    let mut balls = BallEngine::new(
        BallConfig {
            ease_factor: 1.0,
            ..config(20)
        },
        1024,
        768,
    )
    .unwrap();
    balls.update_pointer(300.0, 200.0, None, "mouse");
    balls.step(FIXED_STEP);
    let target = balls.project(300.0, 200.0);
    assert!((balls.positions()[0] - target).length() < 1e-4);

    // held for more steps, still exact
    for _ in 0..30 {
        balls.step(FIXED_STEP);
    }
    assert!((balls.positions()[0] - target).length() < 1e-4);
}

#[test]
fn secondary_leader_snaps_to_its_pointer() {
    let mut balls = BallEngine::new(
        BallConfig {
            ease_factor: 1.0,
            ..config(20)
        },
        800,
        600,
    )
    .unwrap();
    balls.update_pointer(400.0, 300.0, None, "mouse");
    balls.update_pointer(700.0, 100.0, None, "eyes-1");
    balls.step(FIXED_STEP);
    let slot = balls.registry().get("eyes-1").unwrap().slot.unwrap();
    assert!((balls.positions()[slot] - balls.project(700.0, 100.0)).length() < 1e-4);
}

#[test]
fn eased_leader_approaches_pointer() {
    let mut balls = BallEngine::new(config(5), 800, 600).unwrap();
    balls.update_pointer(100.0, 100.0, None, "mouse");
    let target = balls.project(100.0, 100.0);
    let mut last = f32::MAX;
    for _ in 0..200 {
        balls.step(FIXED_STEP);
        let d = (balls.positions()[0] - target).length();
        assert!(d <= last + 1e-6);
        last = d;
    }
    assert!(last < 1e-3);
}

#[test]
fn only_the_primary_leader_is_full_size() {
    let cfg = config(10);
    let (min, max) = (cfg.min_size, cfg.max_size);
    let mut balls = BallEngine::new(cfg, 800, 600).unwrap();
    balls.update_pointer(400.0, 300.0, None, "mouse");
    for _ in 0..120 {
        balls.step(1.0 / 60.0);
    }
    let radii = balls.radii();
    assert_eq!(radii.len(), 10);
    assert_eq!(radii[0], max);
    assert_eq!(radii.iter().filter(|r| **r == max).count(), 1);
    for r in &radii[1..] {
        assert!(*r >= min && *r <= max, "radius {r} outside [{min}, {max}]");
    }
}

#[test]
fn resize_recomputes_bounds_on_next_step() {
    let mut balls = BallEngine::new(config(8), 800, 600).unwrap();
    let before = balls.bounds();
    balls.resize(1600, 600);
    assert_eq!(balls.bounds(), before);
    balls.step(FIXED_STEP);
    let after = balls.bounds();
    assert!((after.half_width - before.half_width * 2.0).abs() < 1e-3);
    assert_eq!(after.floor, before.floor);
}

#[test]
fn paused_balls_stay_put() {
    let mut balls = BallEngine::new(config(8), 800, 600).unwrap();
    balls.step(FIXED_STEP);
    balls.pause();
    let frozen = balls.positions().to_vec();
    for _ in 0..30 {
        balls.step(FIXED_STEP);
    }
    assert_eq!(balls.positions(), frozen.as_slice());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn free_balls_stay_inside_the_walls(
        count in 1usize..30,
        gravity in 0.0f32..0.05,
        bounce in 0.0f32..1.0,
        max_size in 0.6f32..1.5,
        width in 300u32..2000,
        height in 300u32..1200,
        steps in 1usize..300,
        path in prop::collection::vec((0.0f64..1.0, 0.0f64..1.0), 0..20),
    ) {
        let cfg = BallConfig {
            count,
            gravity,
            wall_bounce: bounce,
            min_size: 0.5,
            max_size,
            ..BallConfig::default()
        };
        let mut balls = BallEngine::new(cfg, width, height).unwrap();
        for s in 0..steps {
            if let Some((fx, fy)) = path.get(s % path.len().max(1)) {
                balls.update_pointer(fx * width as f64, fy * height as f64, None, "mouse");
            }
            balls.step(FIXED_STEP);

            let b = balls.bounds();
            for (i, (p, r)) in balls.positions().iter().zip(balls.radii()).enumerate() {
                if balls.is_leader(i) {
                    continue;
                }
                let eps = 1e-4;
                prop_assert!(p.x.abs() <= b.half_width - r + eps, "x {} r {} bound {}", p.x, r, b.half_width);
                prop_assert!(p.y >= b.floor + r - eps, "y {} r {} floor {}", p.y, r, b.floor);
                prop_assert!(p.z.abs() <= b.half_depth - r + eps, "z {} r {}", p.z, r);
            }
        }
    }
}
