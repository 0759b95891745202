//! Plain-text metrics endpoint for monitoring.

use actix_web::{web, HttpResponse, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global request counters for the gateway.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    pub requests_total: Arc<AtomicU64>,
    pub requests_success: Arc<AtomicU64>,
    pub requests_error: Arc<AtomicU64>,
    pub response_time_sum: Arc<AtomicU64>,
    pub active_connections: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            requests_success: Arc::new(AtomicU64::new(0)),
            requests_error: Arc::new(AtomicU64::new(0)),
            response_time_sum: Arc::new(AtomicU64::new(0)),
            active_connections: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn record_request(&self, success: bool, response_time: Duration, _status: u16) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.response_time_sum
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Prometheus-compatible metrics endpoint
pub async fn metrics_endpoint(metrics: web::Data<MetricsCollector>) -> Result<HttpResponse> {
    let total = metrics.requests_total.load(Ordering::Relaxed);
    let success = metrics.requests_success.load(Ordering::Relaxed);
    let errors = metrics.requests_error.load(Ordering::Relaxed);
    let time_sum = metrics.response_time_sum.load(Ordering::Relaxed);
    let connections = metrics.active_connections.load(Ordering::Relaxed);
    let uptime = metrics.start_time.elapsed().as_secs();

    let avg_response_time = if total > 0 {
        time_sum as f64 / total as f64
    } else {
        0.0
    };

    let body = format!(
        r#"# HELP sentra_requests_total Total number of proxied requests
# TYPE sentra_requests_total counter
sentra_requests_total {}

# HELP sentra_requests_success_total Successful proxied requests
# TYPE sentra_requests_success_total counter
sentra_requests_success_total {}

# HELP sentra_requests_error_total Failed proxied requests
# TYPE sentra_requests_error_total counter
sentra_requests_error_total {}

# HELP sentra_response_time_avg Average response time in milliseconds
# TYPE sentra_response_time_avg gauge
sentra_response_time_avg {:.2}

# HELP sentra_active_connections Current in-flight requests
# TYPE sentra_active_connections gauge
sentra_active_connections {}

# HELP sentra_uptime_seconds Service uptime in seconds
# TYPE sentra_uptime_seconds counter
sentra_uptime_seconds {}
"#,
        total, success, errors, avg_response_time, connections, uptime
    );

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(body))
}

pub fn configure_metrics(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_endpoint));
}
