use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, GaugeVec, HistogramVec, register_counter, register_counter_vec,
    register_gauge_vec, register_histogram_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: CounterVec = register_counter_vec!(
        "storyforge_requests_total",
        "Total number of generation requests",
        &["route"]
    )
    .unwrap();
    pub static ref RATE_LIMITED_TOTAL: CounterVec = register_counter_vec!(
        "storyforge_rate_limited_total",
        "Requests rejected by a rate limiter",
        &["limiter"]
    )
    .unwrap();
    pub static ref OUTLINE_RETRIES: Counter = register_counter!(
        "storyforge_outline_retries_total",
        "Outline regenerations triggered by a structure mismatch"
    )
    .unwrap();
    pub static ref OUTLINE_DEGRADED: Counter = register_counter!(
        "storyforge_outline_degraded_total",
        "Outlines returned without matching the requested structure"
    )
    .unwrap();
    pub static ref GENERATION_LATENCY: HistogramVec = register_histogram_vec!(
        "storyforge_generation_latency_seconds",
        "Upstream generation latency in seconds",
        &["route"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_TRACKED_KEYS: GaugeVec = register_gauge_vec!(
        "storyforge_rate_limit_tracked_keys",
        "Keys currently tracked by each rate limiter",
        &["limiter"]
    )
    .unwrap();
}
