//! Prometheus-compatible metrics endpoint
//!
//! Exposes arena and coordination metrics in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Rolling window used for tick percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for the arena server
#[derive(Debug)]
pub struct Metrics {
    // Arena counts
    pub arenas_active: AtomicU64,
    pub arenas_playing: AtomicU64,
    pub players_total: AtomicU64,
    pub matches_started: AtomicU64,
    pub matches_finished: AtomicU64,
    pub invariant_violations: AtomicU64,

    // Tick timing (microseconds, across all arenas)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Coordination
    pub records_published: AtomicU64,
    pub records_retracted: AtomicU64,
    pub publish_failures: AtomicU64,
    pub store_errors: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub setting_mismatches: AtomicU64,

    start_time: Instant,

    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            arenas_active: AtomicU64::new(0),
            arenas_playing: AtomicU64::new(0),
            players_total: AtomicU64::new(0),
            matches_started: AtomicU64::new(0),
            matches_finished: AtomicU64::new(0),
            invariant_violations: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            records_published: AtomicU64::new(0),
            records_retracted: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            setting_mismatches: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Bump a counter by one
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        // Arenas
        metric!("bedwars_arenas_active", "Arenas hosted by this server", "gauge",
            self.arenas_active.load(Ordering::Relaxed));
        metric!("bedwars_arenas_playing", "Arenas with a match in progress", "gauge",
            self.arenas_playing.load(Ordering::Relaxed));
        metric!("bedwars_players_total", "Players across all arenas", "gauge",
            self.players_total.load(Ordering::Relaxed));
        metric!("bedwars_matches_started_total", "Matches started", "counter",
            self.matches_started.load(Ordering::Relaxed));
        metric!("bedwars_matches_finished_total", "Matches finished", "counter",
            self.matches_finished.load(Ordering::Relaxed));
        metric!("bedwars_invariant_violations_total", "Arenas halted on an event order violation", "counter",
            self.invariant_violations.load(Ordering::Relaxed));

        // Ticks
        metric!("bedwars_tick_time_microseconds", "Last arena tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("bedwars_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("bedwars_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("bedwars_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("bedwars_tick_count", "Total arena ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        // Coordination
        if cfg!(feature = "metrics_extended") {
            metric!("bedwars_records_published_total", "Arena records written to the shared store", "counter",
                self.records_published.load(Ordering::Relaxed));
            metric!("bedwars_records_retracted_total", "Arena records deleted from the shared store", "counter",
                self.records_retracted.load(Ordering::Relaxed));
            metric!("bedwars_publish_failures_total", "Failed record publishes", "counter",
                self.publish_failures.load(Ordering::Relaxed));
            metric!("bedwars_store_errors_total", "Shared store or channel errors", "counter",
                self.store_errors.load(Ordering::Relaxed));
            metric!("bedwars_messages_sent_total", "Channel messages sent", "counter",
                self.messages_sent.load(Ordering::Relaxed));
            metric!("bedwars_messages_received_total", "Channel messages received", "counter",
                self.messages_received.load(Ordering::Relaxed));
            metric!("bedwars_setting_mismatches_total", "Fleet settings that differ from local configuration", "counter",
                self.setting_mismatches.load(Ordering::Relaxed));
        }

        metric!("bedwars_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics (alternative for direct API access)
    pub fn to_json(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        serde_json::json!({
            "arenas": {
                "active": load(&self.arenas_active),
                "playing": load(&self.arenas_playing),
                "players": load(&self.players_total),
                "matches_started": load(&self.matches_started),
                "matches_finished": load(&self.matches_finished),
                "invariant_violations": load(&self.invariant_violations),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
            },
            "coordination": {
                "records_published": load(&self.records_published),
                "records_retracted": load(&self.records_retracted),
                "publish_failures": load(&self.publish_failures),
                "store_errors": load(&self.store_errors),
                "messages_sent": load(&self.messages_sent),
                "messages_received": load(&self.messages_received),
                "setting_mismatches": load(&self.setting_mismatches),
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

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Route one request line
fn respond(metrics: &Metrics, request: &str) -> String {
    if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        http_response("200 OK", "application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        http_response("200 OK", "text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        http_response("200 OK", "text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}

/// Start the metrics HTTP server; returns when cancelled
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16, cancel: CancellationToken) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = tokio::select! {
            () = cancel.cancelled() => {
                debug!("Metrics server stopped");
                return Ok(());
            }
            accepted = listener.accept() => accepted?,
        };
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
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
