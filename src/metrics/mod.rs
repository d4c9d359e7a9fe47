//! Outbound call metrics

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

/// Outcome label for calls that got any HTTP answer back
pub const OUTCOME_RESPONDED: &str = "responded";

#[derive(Clone)]
pub struct Metrics {
    requests: Counter<u64>,
    request_duration: Histogram<f64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("proxy.requests")
                .with_description("Total number of outbound backend calls")
                .build(),
            request_duration: meter
                .f64_histogram("proxy.request.duration")
                .with_description("Duration of outbound backend calls in seconds")
                .with_unit("s")
                .build(),
        }
    }

    /// Instruments on the global meter provider; no-ops until one is installed
    pub fn global() -> Self {
        Self::new(&opentelemetry::global::meter("credential-proxy"))
    }

    /// `outcome` is [`OUTCOME_RESPONDED`] or a transport error kind
    pub fn record_call(&self, service: &str, adapter: &'static str, duration: f64, outcome: &'static str) {
        let attrs = &[
            KeyValue::new("service", service.to_string()),
            KeyValue::new("adapter", adapter),
            KeyValue::new("outcome", outcome),
        ];
        self.requests.add(1, attrs);
        self.request_duration.record(duration, attrs);
    }
}
