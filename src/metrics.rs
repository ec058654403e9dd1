use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, Encoder, HistogramVec, TextEncoder};

/// Request latency, labelled by matched route, method and response status
pub static HTTP_SERVER_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cerberus_http_server_request_duration_seconds",
        "Duration of HTTP server requests",
        &["route", "method", "status_code"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

pub fn observe_request(route: &str, method: &str, status_code: u16, seconds: f64) {
    HTTP_SERVER_REQUEST_DURATION
        .with_label_values(&[route, method, &status_code.to_string()])
        .observe(seconds);
}

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
