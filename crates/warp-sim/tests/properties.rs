//! End-to-end behavior of a World under time dilation

use std::sync::{Arc, Mutex};
use warp_core::Vec3;
use warp_particles::rand::ParticleRng;
use warp_particles::{Affector, Emitter, EmitterConfig, EmitterShape, Particle};
use warp_runtime::{TimeContext, TimeDependency, TimeStep};
use warp_sim::{SimConfig, World};
use warp_tasks::{lock_registry, BridgeError, TagPredicate, Task, TaskOutcome, Translate, WaitTag};
use warp_world::{NodeHandle, NodeWorld};

fn world() -> World {
    World::new(&SimConfig::default())
}

#[test]
fn translate_reaches_same_position_under_any_dilation() {
    let direction = Vec3::new(3.0, 0.0, -1.0);
    let duration = 1.0;
    let dt = 0.125;

    for dilation in [0.25_f32, 0.5, 1.0, 2.0, 4.0] {
        let mut world = world();
        let node = world.spawn_node("mover", Vec3::new(1.0, 1.0, 1.0)).unwrap();
        let handle = world.spawn_task(Translate::new(node, direction, duration));
        world.set_dilation(dilation).unwrap();

        let mut real_time = 0.0;
        while !world.scheduler().is_finished(handle).unwrap() {
            world.update(dt).unwrap();
            real_time += dt;
            assert!(real_time < 100.0, "translate never finished at {}", dilation);
        }

        let p = world.nodes().position(node).unwrap();
        let expected = Vec3::new(4.0, 1.0, 0.0);
        assert!((p - expected).length() < 1e-4, "dilation {}: {:?}", dilation, p);
        assert!(
            (real_time - duration / dilation).abs() < 1e-5,
            "dilation {}: took {}",
            dilation,
            real_time
        );
    }
}

/// Writes the frame number into a node's x coordinate
struct Writer {
    node: NodeHandle,
    priority: i32,
    frame: f32,
}

impl Task for Writer {
    fn update(&mut self, _step: &TimeStep, world: &mut NodeWorld) {
        self.frame += 1.0;
        world.set_position(self.node, Vec3::new(self.frame, 0.0, 0.0));
    }
    fn outcome(&self) -> TaskOutcome {
        TaskOutcome::Running
    }
    fn kill(&mut self) {}
    fn priority(&self) -> i32 {
        self.priority
    }
    fn name(&self) -> &str {
        "writer"
    }
}

/// Records the node's x coordinate each update
struct Reader {
    node: NodeHandle,
    priority: i32,
    label: &'static str,
    seen: Arc<Mutex<Vec<(&'static str, f32)>>>,
    outcome: TaskOutcome,
}

impl Task for Reader {
    fn update(&mut self, _step: &TimeStep, world: &mut NodeWorld) {
        let x = world.position(self.node).map(|p| p.x).unwrap_or(-1.0);
        self.seen.lock().unwrap().push((self.label, x));
    }
    fn outcome(&self) -> TaskOutcome {
        self.outcome.clone()
    }
    fn kill(&mut self) {
        self.outcome = TaskOutcome::Killed;
    }
    fn priority(&self) -> i32 {
        self.priority
    }
    fn name(&self) -> &str {
        self.label
    }
}

#[test]
fn lower_priority_sees_higher_priority_state_from_previous_frame() {
    let mut world = world();
    let node = world.spawn_node("shared", Vec3::ZERO).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    // Spawned first so insertion order alone would run it first
    world.spawn_task(Writer {
        node,
        priority: 10,
        frame: 0.0,
    });
    world.spawn_task(Reader {
        node,
        priority: 0,
        label: "reader",
        seen: seen.clone(),
        outcome: TaskOutcome::Running,
    });

    for _ in 0..4 {
        world.update(0.1).unwrap();
    }
    let xs: Vec<f32> = seen.lock().unwrap().iter().map(|&(_, x)| x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn equal_priorities_keep_insertion_order() {
    let mut world = world();
    let node = world.spawn_node("n", Vec3::ZERO).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for label in ["a", "b", "c"] {
        world.spawn_task(Reader {
            node,
            priority: 3,
            label,
            seen: seen.clone(),
            outcome: TaskOutcome::Running,
        });
    }
    world.update(0.1).unwrap();
    world.update(0.1).unwrap();
    let labels: Vec<&str> = seen.lock().unwrap().iter().map(|&(l, _)| l).collect();
    assert_eq!(labels, vec!["a", "b", "c", "a", "b", "c"]);
}

#[test]
fn sphere_border_emitter_spawns_on_shell_moving_outward() {
    let mut world = world();
    let center = Vec3::new(2.0, -1.0, 0.5);
    let node = world.spawn_node("shell", center).unwrap();
    let radius = 1.5;
    let id = world
        .attach_emitter(
            node,
            EmitterConfig {
                emission_rate: 0.0,
                burst_count: 1000,
                max_particles: 1000,
                speed_min: 2.0,
                speed_max: 2.0,
                lifetime_min: 10.0,
                lifetime_max: 10.0,
                shape: EmitterShape::sphere(Vec3::ZERO, radius, true),
                ..EmitterConfig::default()
            },
        )
        .unwrap();

    // Zero elapsed: particles stay where they were sampled
    world.update(0.0).unwrap();
    let particles = world.particles().particles(id).unwrap();
    assert_eq!(particles.len(), 1000);
    for p in particles {
        let offset = p.position - center;
        assert!((offset.length() - radius).abs() < 1e-4);
        assert!((p.velocity.length() - 2.0).abs() < 1e-4);
        assert!((offset.normalized().dot(&p.velocity.normalized()) - 1.0).abs() < 1e-4);
    }
}

#[test]
fn box_emitter_stays_inside_bounds() {
    let mut world = world();
    let node = world.spawn_node("crate", Vec3::new(10.0, 0.0, 0.0)).unwrap();
    let min = Vec3::new(-1.0, -2.0, -3.0);
    let max = Vec3::new(1.0, 2.0, 3.0);
    let id = world
        .attach_emitter(
            node,
            EmitterConfig {
                emission_rate: 0.0,
                burst_count: 500,
                max_particles: 500,
                shape: EmitterShape::aabb(min, max),
                ..EmitterConfig::default()
            },
        )
        .unwrap();

    world.update(0.0).unwrap();
    for p in world.particles().particles(id).unwrap() {
        let local = p.position - Vec3::new(10.0, 0.0, 0.0);
        assert!(local.x >= min.x && local.x <= max.x);
        assert!(local.y >= min.y && local.y <= max.y);
        assert!(local.z >= min.z && local.z <= max.z);
    }
}

#[test]
fn speed_limiter_caps_fast_and_keeps_slow() {
    let limit = 3.0;
    let velocities = [
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(0.0, -3.0, 0.0),
        Vec3::new(-4.0, 4.0, 2.0),
        Vec3::ZERO,
    ];
    let mut particles: Vec<Particle> = velocities
        .iter()
        .map(|&velocity| Particle {
            velocity,
            lifetime: 1.0,
            ..Particle::default()
        })
        .collect();

    let limiter = Affector::SpeedLimiter { limit };
    let time = TimeContext::with(0.016, 0.5).unwrap();
    limiter.apply(&mut particles, &time.step(limiter.dependency()));

    for (p, original) in particles.iter().zip(velocities) {
        assert!(p.velocity.length() <= limit + 1e-5);
        if original.length() <= limit {
            assert_eq!(p.velocity, original);
        }
    }
}

#[test]
fn speed_limiter_runs_after_force_regardless_of_registration() {
    let mut world = world();
    let node = world.spawn_node("jet", Vec3::ZERO).unwrap();
    let id = world
        .attach_emitter(
            node,
            EmitterConfig {
                emission_rate: 0.0,
                burst_count: 50,
                speed_min: 0.0,
                speed_max: 0.0,
                lifetime_min: 10.0,
                lifetime_max: 10.0,
                affectors: vec![
                    Affector::SpeedLimiter { limit: 1.0 },
                    Affector::Force {
                        acceleration: Vec3::new(0.0, 100.0, 0.0),
                    },
                ],
                ..EmitterConfig::default()
            },
        )
        .unwrap();

    for _ in 0..5 {
        world.update(0.1).unwrap();
        for p in world.particles().particles(id).unwrap() {
            assert!(p.velocity.length() <= 1.0 + 1e-5);
        }
    }
}

#[test]
fn emission_total_independent_of_frame_split() {
    let rate: f32 = 9.0;
    let total: f32 = 2.0;
    let splits: [&[f32]; 3] = [
        &[0.01; 200],
        &[1.0, 1.0],
        &[0.3, 0.05, 0.65, 0.2, 0.4, 0.15, 0.25],
    ];
    let expected = (rate * total).floor() as i64;

    for frames in splits {
        let sum: f32 = frames.iter().sum();
        assert!((sum - total).abs() < 1e-4);

        let mut emitter = Emitter::new(EmitterConfig {
            emission_rate: rate,
            max_particles: 1000,
            lifetime_min: 100.0,
            lifetime_max: 100.0,
            ..EmitterConfig::default()
        });
        let mut rng = ParticleRng::new(5);
        for &dt in frames {
            emitter.update(Vec3::ZERO, &TimeContext::with(dt, 1.0).unwrap(), &mut rng);
        }
        let emitted = emitter.spawned_total as i64;
        assert!(
            (emitted - expected).abs() <= 1,
            "split of {} frames emitted {}",
            frames.len(),
            emitted
        );
    }
}

#[test]
fn emission_scales_with_dilation() {
    let config = EmitterConfig {
        emission_rate: 10.0,
        max_particles: 1000,
        lifetime_min: 100.0,
        lifetime_max: 100.0,
        ..EmitterConfig::default()
    };
    let mut slow = Emitter::new(config.clone());
    let mut normal = Emitter::new(config);
    let mut rng = ParticleRng::new(11);
    for _ in 0..10 {
        slow.update(Vec3::ZERO, &TimeContext::with(0.1, 0.5).unwrap(), &mut rng);
        normal.update(Vec3::ZERO, &TimeContext::with(0.1, 1.0).unwrap(), &mut rng);
    }
    assert!((slow.spawned_total as i64 - 5).abs() <= 1);
    assert!((normal.spawned_total as i64 - 10).abs() <= 1);
}

#[test]
fn killed_task_is_finished_immediately_and_never_updated_again() {
    let mut world = world();
    let node = world.spawn_node("n", Vec3::ZERO).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handle = world.spawn_task(Reader {
        node,
        priority: 0,
        label: "victim",
        seen: seen.clone(),
        outcome: TaskOutcome::Running,
    });

    world.update(0.1).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);

    world.scheduler_mut().kill(handle).unwrap();
    assert!(world.scheduler().is_finished(handle).unwrap());

    world.update(0.1).unwrap();
    world.update(0.1).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(world.scheduler().active_count(), 0);
    assert_eq!(world.scheduler().status(handle).unwrap(), TaskOutcome::Killed);
}

#[test]
fn wait_tag_on_lost_node_finishes_in_one_update() {
    let mut world = world();
    let node = world.spawn_node("doomed", Vec3::ZERO).unwrap();
    let handle = world.spawn_task(WaitTag::new(node, TagPredicate::present("never")));
    world.update(0.1).unwrap();
    assert!(!world.scheduler().is_finished(handle).unwrap());

    world.nodes_mut().despawn(node).unwrap();
    world.update(0.1).unwrap();
    assert_eq!(world.scheduler().status(handle).unwrap(), TaskOutcome::TargetLost);
    assert_eq!(world.scheduler().active_count(), 0);
}

#[test]
fn reaped_handles_report_bridge_violations() {
    let mut world = world();
    let handle = world.spawn_task(warp_tasks::Wait::new(0.0));
    world.update(0.1).unwrap();

    assert!(world.scheduler().is_finished(handle).unwrap());
    assert_eq!(
        world.scheduler_mut().kill(handle),
        Err(BridgeError::Reaped(handle.to_bits()))
    );
    let registry = world.scheduler().registry();
    assert_eq!(
        lock_registry(&registry).release(handle),
        Err(BridgeError::DoubleRelease(handle.to_bits()))
    );
}

#[test]
fn duration_and_speed_steps_agree_on_distance() {
    let time = TimeContext::with(0.2, 0.3).unwrap();
    let v = Vec3::new(5.0, 0.0, 0.0);
    let by_duration = time.step(TimeDependency::Duration).distance(v);
    let by_speed = time.step(TimeDependency::Speed).distance(v);
    assert!((by_duration - by_speed).length() < 1e-6);
}
