//! Prometheus instruments for database operation outcomes.
//!
//! Series:
//! - `db_client_handle_total{type,name,addr,code}`: operation counter, with
//!   `code` one of `OK`, `Empty`, `Error`, `open-err`
//! - `db_client_handle_seconds{type,name,addr}`: operation latency

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

/// Subsystem label shared by every series this crate emits.
pub const TYPE_DB: &str = "db";

static HANDLE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "db_client_handle_total",
        "Database operations by qualified resource, address and outcome",
        &["type", "name", "addr", "code"]
    )
    .expect("failed to register db_client_handle_total")
});

static HANDLE_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "db_client_handle_seconds",
        "Database operation latency by qualified resource and address",
        &["type", "name", "addr"]
    )
    .expect("failed to register db_client_handle_seconds")
});

pub(crate) fn incr_handle(name: &str, addr: &str, code: &str) {
    HANDLE_TOTAL
        .with_label_values(&[TYPE_DB, name, addr, code])
        .inc();
}

pub(crate) fn observe_handle_seconds(name: &str, addr: &str, seconds: f64) {
    HANDLE_SECONDS
        .with_label_values(&[TYPE_DB, name, addr])
        .observe(seconds);
}

#[cfg(test)]
pub(crate) fn handle_total(name: &str, addr: &str, code: &str) -> u64 {
    HANDLE_TOTAL
        .with_label_values(&[TYPE_DB, name, addr, code])
        .get()
}

#[cfg(test)]
pub(crate) fn handle_seconds_count(name: &str, addr: &str) -> u64 {
    HANDLE_SECONDS
        .with_label_values(&[TYPE_DB, name, addr])
        .get_sample_count()
}
