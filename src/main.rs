use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use creature_motion_server::config::MotionConfig;
use creature_motion_server::metrics::{self, Metrics};
use creature_motion_server::motion::sim::{LinearSplineMover, LoggingHooks, OpenTerrain, StraightPathFinder};
use creature_motion_server::motion::waypoints::WaypointStore;
use creature_motion_server::motion::{Actor, ActorId, MotionSlot, MotionWorld, MovementGenerator};
use creature_motion_server::util::vec2::Vec2;

/// Side of the square the demo population spawns in
const SPAWN_AREA: f32 = 500.0;
/// Every n-th demo actor chases its predecessor instead of wandering
const CHASER_EVERY: usize = 20;

type DemoWorld = MotionWorld<StraightPathFinder, LinearSplineMover, OpenTerrain, LoggingHooks>;

fn populate(world: &mut DemoWorld, config: &MotionConfig) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(config.rng_seed ^ 0xa5a5);
    for index in 0..config.actor_count {
        let id = index as ActorId + 1;
        let position = Vec2::new(rng.gen_range(0.0..SPAWN_AREA), rng.gen_range(0.0..SPAWN_AREA));
        let mut actor = Actor::new(id, position);
        actor.orientation = rng.gen_range(0.0..std::f32::consts::TAU);
        actor.wander_radius = config.wander_radius;
        let chaser = index > 0 && index % CHASER_EVERY == 0;
        if chaser {
            actor.victim = Some(id - 1);
        }
        world.spawn(actor)?;
        world.request(id, MovementGenerator::random(config.wander_radius), MotionSlot::Default)?;

        if chaser {
            world.request(id, MovementGenerator::chase(id - 1, None, None), MotionSlot::Active)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Creature Motion Server v{}", env!("CARGO_PKG_VERSION"));

    let config = MotionConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg).context("invalid configuration")?;
    info!(
        "Configuration loaded: {} Hz, {} actors, wander radius {}",
        config.tick_rate, config.actor_count, config.wander_radius
    );

    let waypoints = match &config.waypoint_file {
        Some(path) => {
            let store = WaypointStore::load_file(path)
                .with_context(|| format!("loading waypoints from {}", path.display()))?;
            info!("Loaded {} waypoint paths from {}", store.len(), path.display());
            store
        }
        None => WaypointStore::new(),
    };

    let mut world = MotionWorld::new(
        StraightPathFinder::new(),
        LinearSplineMover::new(),
        OpenTerrain,
        LoggingHooks,
        config.rng_seed,
    )
    .with_waypoints(waypoints)
    .with_command_capacity(config.command_buffer_capacity);
    populate(&mut world, &config)?;

    let metrics = Arc::new(Metrics::new());
    metrics.actors.store(world.actor_count() as u64, Ordering::Relaxed);

    if let Some(port) = config.metrics_port {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let diff_ms = config.tick_duration_ms();
    let mut interval = tokio::time::interval(Duration::from_millis(diff_ms as u64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let tick_loop = async {
        loop {
            interval.tick().await;
            let start = Instant::now();
            let stats = world.tick(diff_ms);
            metrics.record_tick_time(start.elapsed());
            metrics.record_tick(&stats);
            metrics.actors.store(world.actor_count() as u64, Ordering::Relaxed);
            metrics.moving_actors.store(world.splines().in_flight() as u64, Ordering::Relaxed);
        }
    };

    tokio::select! {
        _ = tick_loop => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutdown signal received");
        }
    }

    info!("Server stopped after {} ticks", metrics.tick_count.load(Ordering::Relaxed));
    Ok(())
}
