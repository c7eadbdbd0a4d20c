//! Prometheus-compatible metrics endpoint
//!
//! Exposes motion server counters in Prometheus format.
//! Default endpoint: http://localhost:9100/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::motion::services::TickStats;

/// Number of tick samples kept for percentiles
const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for the motion server
#[derive(Debug)]
pub struct Metrics {
    // Population
    pub actors: AtomicU64,
    pub moving_actors: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Generator work, accumulated from TickStats
    pub paths_computed: AtomicU64,
    pub path_failures: AtomicU64,
    pub splines_launched: AtomicU64,
    pub informs: AtomicU64,
    pub generators_initialized: AtomicU64,
    pub generators_finalized: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            actors: AtomicU64::new(0),
            moving_actors: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            paths_computed: AtomicU64::new(0),
            path_failures: AtomicU64::new(0),
            splines_launched: AtomicU64::new(0),
            informs: AtomicU64::new(0),
            generators_initialized: AtomicU64::new(0),
            generators_finalized: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a tick duration and refresh the percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        self.tick_time_max_us.fetch_max(us, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        if history.len() >= TICK_HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(us);

        let mut sorted: Vec<u64> = history.iter().copied().collect();
        sorted.sort_unstable();
        let len = sorted.len();
        let p95 = sorted[(len * 95 / 100).min(len - 1)];
        let p99 = sorted[(len * 99 / 100).min(len - 1)];
        self.tick_time_p95_us.store(p95, Ordering::Relaxed);
        self.tick_time_p99_us.store(p99, Ordering::Relaxed);
    }

    /// Fold one tick's generator counters into the totals
    pub fn record_tick(&self, stats: &TickStats) {
        self.paths_computed.fetch_add(stats.paths_computed, Ordering::Relaxed);
        self.path_failures.fetch_add(stats.path_failures, Ordering::Relaxed);
        self.splines_launched.fetch_add(stats.splines_launched, Ordering::Relaxed);
        self.informs.fetch_add(stats.informs, Ordering::Relaxed);
        self.generators_initialized
            .fetch_add(stats.generators_initialized, Ordering::Relaxed);
        self.generators_finalized
            .fetch_add(stats.generators_finalized, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("creature_motion_actors", "Actors in the world", "gauge",
            self.actors.load(Ordering::Relaxed));
        metric!("creature_motion_actors_moving", "Actors with a spline in flight", "gauge",
            self.moving_actors.load(Ordering::Relaxed));

        metric!("creature_motion_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("creature_motion_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("creature_motion_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("creature_motion_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("creature_motion_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("creature_motion_paths_computed_total", "Path queries issued by generators", "counter",
            self.paths_computed.load(Ordering::Relaxed));
        metric!("creature_motion_path_failures_total", "Path queries that found no usable path", "counter",
            self.path_failures.load(Ordering::Relaxed));
        metric!("creature_motion_splines_launched_total", "Splines launched", "counter",
            self.splines_launched.load(Ordering::Relaxed));
        metric!("creature_motion_informs_total", "Movement informs delivered", "counter",
            self.informs.load(Ordering::Relaxed));
        metric!("creature_motion_generators_initialized_total", "Generators initialized", "counter",
            self.generators_initialized.load(Ordering::Relaxed));
        metric!("creature_motion_generators_finalized_total", "Generators finalized", "counter",
            self.generators_finalized.load(Ordering::Relaxed));

        metric!("creature_motion_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "actors": {
                "total": self.actors.load(Ordering::Relaxed),
                "moving": self.moving_actors.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
            },
            "generators": {
                "paths_computed": self.paths_computed.load(Ordering::Relaxed),
                "path_failures": self.path_failures.load(Ordering::Relaxed),
                "splines_launched": self.splines_launched.load(Ordering::Relaxed),
                "informs": self.informs.load(Ordering::Relaxed),
                "initialized": self.generators_initialized.load(Ordering::Relaxed),
                "finalized": self.generators_finalized.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    // Longest prefix first
                    let response = if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
                        http_response("application/json", &metrics.to_json())
                    } else if request.starts_with("GET /metrics") {
                        http_response("text/plain; version=0.0.4", &metrics.to_prometheus())
                    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
                        http_response("text/plain", "OK")
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
