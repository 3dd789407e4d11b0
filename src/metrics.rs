use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};

lazy_static! {
    pub static ref CHECKS_TOTAL: CounterVec = register_counter_vec!(
        "tokengate_checks_total",
        "Total number of admission checks",
        &["allowed"]
    )
    .unwrap();

    pub static ref CHECK_DURATION: HistogramVec = register_histogram_vec!(
        "tokengate_check_duration_seconds",
        "Backend check duration in seconds",
        &["allowed"],
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    pub static ref BACKEND_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "tokengate_backend_errors_total",
        "Total number of failed admission checks",
        &["error_type"]
    )
    .unwrap();

    pub static ref SCRIPT_EXECUTIONS_TOTAL: CounterVec = register_counter_vec!(
        "tokengate_script_executions_total",
        "Total number of token bucket script executions",
        &["result"]
    )
    .unwrap();

    pub static ref SCRIPT_RELOADS_TOTAL: CounterVec = register_counter_vec!(
        "tokengate_script_reloads_total",
        "Times the token bucket script was reinstalled after NOSCRIPT",
        &["reason"]
    )
    .unwrap();
}

/// Record a completed admission check
pub fn record_check(allowed: bool, duration_secs: f64) {
    let allowed_str = if allowed { "true" } else { "false" };
    CHECKS_TOTAL.with_label_values(&[allowed_str]).inc();
    CHECK_DURATION
        .with_label_values(&[allowed_str])
        .observe(duration_secs);
}

/// Record a check that failed with a backend or configuration error
pub fn record_backend_error(error_type: &str) {
    BACKEND_ERRORS_TOTAL
        .with_label_values(&[error_type])
        .inc();
}

/// Record a script execution
pub fn record_script_execution(success: bool) {
    let result = if success { "success" } else { "error" };
    SCRIPT_EXECUTIONS_TOTAL.with_label_values(&[result]).inc();
}

/// Record a script reinstall after the store lost its script cache
pub fn record_script_reload() {
    SCRIPT_RELOADS_TOTAL.with_label_values(&["noscript"]).inc();
}
