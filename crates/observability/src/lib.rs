use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Process-wide counters. Every increment is also forwarded to the
/// `metrics` facade so an installed recorder can export it.
#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    submissions_total: AtomicU64,
    invalid_submissions_total: AtomicU64,
    follow_ups_created_total: AtomicU64,
    assist_calls_total: AtomicU64,
    assist_failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub submissions_total: u64,
    pub invalid_submissions_total: u64,
    pub follow_ups_created_total: u64,
    pub assist_calls_total: u64,
    pub assist_failures_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ayurwell_requests_total").increment(1);
    }

    pub fn inc_submission(&self) {
        self.submissions_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ayurwell_prakriti_submissions_total").increment(1);
    }

    pub fn inc_invalid_submission(&self) {
        self.invalid_submissions_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ayurwell_prakriti_invalid_total").increment(1);
    }

    pub fn inc_follow_up_created(&self) {
        self.follow_ups_created_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ayurwell_follow_ups_created_total").increment(1);
    }

    pub fn inc_assist_call(&self, kind: &'static str) {
        self.assist_calls_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ayurwell_assist_calls_total", "kind" => kind).increment(1);
    }

    pub fn inc_assist_failure(&self, kind: &'static str) {
        self.assist_failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("ayurwell_assist_failures_total", "kind" => kind).increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("ayurwell_request_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            submissions_total: self.submissions_total.load(Ordering::Relaxed),
            invalid_submissions_total: self.invalid_submissions_total.load(Ordering::Relaxed),
            follow_ups_created_total: self.follow_ups_created_total.load(Ordering::Relaxed),
            assist_calls_total: self.assist_calls_total.load(Ordering::Relaxed),
            assist_failures_total: self.assist_failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,ayurwell_api=info,ayurwell_wellness=info,ayurwell_assist=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
