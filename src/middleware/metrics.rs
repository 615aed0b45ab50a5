use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::dispatcher::HttpResponse;
use crate::server::Request;

/// Middleware for collecting Prometheus-compatible metrics
///
/// All counters use relaxed atomics; the numbers are eventually consistent and cost one
/// `fetch_add` each.
///
/// Metrics collected:
/// - Total request count and average latency
/// - Back-off answers: 429 (rate limited) and 503 (guard busy or handler failure)
/// - Authentication failures (401 and 403)
/// - Conditional GET hits (304)
/// - Top-level requests (`/health`, `/metrics`) that bypass the dispatcher
/// - Coroutine stack size
#[derive(Debug, Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    rate_limited: AtomicUsize,
    unavailable: AtomicUsize,
    auth_failures: AtomicUsize,
    not_modified: AtomicUsize,
    top_level_requests: AtomicUsize,
    stack_size: AtomicUsize,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean processing time; zero before the first request.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    #[must_use]
    pub fn rate_limited(&self) -> usize {
        self.rate_limited.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn unavailable(&self) -> usize {
        self.unavailable.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn auth_failures(&self) -> usize {
        self.auth_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn not_modified(&self) -> usize {
        self.not_modified.load(Ordering::Relaxed)
    }

    /// Count an infrastructure request (`/health`, `/metrics`) answered outside dispatch.
    pub fn inc_top_level_request(&self) {
        self.top_level_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn top_level_request_count(&self) -> usize {
        self.top_level_requests.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }

    /// Render all counters in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        let metrics: [(&str, &str, &str, String); 8] = [
            ("fedrouter_requests_total", "counter", "Total number of dispatched requests", self.request_count().to_string()),
            ("fedrouter_request_latency_seconds", "gauge", "Average request latency in seconds", self.average_latency().as_secs_f64().to_string()),
            ("fedrouter_rate_limited_total", "counter", "Requests refused by the heavy-route limiter", self.rate_limited().to_string()),
            ("fedrouter_unavailable_total", "counter", "Requests refused by a busy guard or a failed handler", self.unavailable().to_string()),
            ("fedrouter_auth_failures_total", "counter", "Requests answered 401 or 403", self.auth_failures().to_string()),
            ("fedrouter_not_modified_total", "counter", "Conditional requests answered 304", self.not_modified().to_string()),
            ("fedrouter_top_level_requests_total", "counter", "Health and metrics requests", self.top_level_request_count().to_string()),
            ("fedrouter_coroutine_stack_bytes", "gauge", "Configured coroutine stack size", self.stack_size().to_string()),
        ];
        let mut out = String::with_capacity(1024);
        for (name, kind, help, value) in metrics {
            // writing to a String cannot fail
            if writeln!(out, "# HELP {name} {help}\n# TYPE {name} {kind}\n{name} {value}").is_err() {
                break;
            }
        }
        out
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &Request) -> Option<HttpResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &Request, res: &mut HttpResponse, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        let counter = match res.status {
            429 => Some(&self.rate_limited),
            503 => Some(&self.unavailable),
            401 | 403 => Some(&self.auth_failures),
            304 => Some(&self.not_modified),
            _ => None,
        };
        if let Some(c) = counter {
            c.fetch_add(1, Ordering::Relaxed);
        }
        let stack = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        self.stack_size.store(stack, Ordering::Relaxed);
    }
}
