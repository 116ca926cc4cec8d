use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::{Duration, Instant};

pub struct MetricsService {
    registry: Registry,
    http_requests: IntCounterVec,
    request_duration: HistogramVec,
    quota_denials: IntCounter,
    upstream_failures: IntCounterVec,
    analyses: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by status class"),
            &["status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request latency in seconds")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["endpoint"],
        )?;
        let quota_denials =
            IntCounter::new("quota_denials_total", "Requests rejected by the daily limit")?;
        let upstream_failures = IntCounterVec::new(
            Opts::new("upstream_failures_total", "Failed analyses by error kind"),
            &["kind"],
        )?;
        let analyses = IntCounterVec::new(
            Opts::new("analyses_total", "Completed analyses by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(quota_denials.clone()))?;
        registry.register(Box::new(upstream_failures.clone()))?;
        registry.register(Box::new(analyses.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            request_duration,
            quota_denials,
            upstream_failures,
            analyses,
        })
    }

    pub fn record_response(&self, status: u16) {
        let class = match status {
            200..=299 => "2xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "other",
        };
        self.http_requests.with_label_values(&[class]).inc();
    }

    pub fn record_request_duration(&self, duration: Duration, endpoint: &str) {
        self.request_duration
            .with_label_values(&[endpoint])
            .observe(duration.as_secs_f64());
    }

    pub fn record_quota_denial(&self) {
        self.quota_denials.inc();
    }

    pub fn record_failure(&self, kind: &str) {
        self.upstream_failures.with_label_values(&[kind]).inc();
    }

    pub fn record_analysis(&self, has_watermelon: Option<bool>) {
        let outcome = match has_watermelon {
            Some(true) => "watermelon",
            Some(false) => "none",
            None => "unknown",
        };
        self.analyses.with_label_values(&[outcome]).inc();
    }

    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Records request latency for an endpoint when dropped.
pub struct RequestTimer<'a> {
    start: Instant,
    endpoint: String,
    metrics: &'a MetricsService,
}

impl<'a> RequestTimer<'a> {
    pub fn new(metrics: &'a MetricsService, endpoint: String) -> Self {
        Self {
            start: Instant::now(),
            endpoint,
            metrics,
        }
    }
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        self.metrics
            .record_request_duration(self.start.elapsed(), &self.endpoint);
    }
}
