//! Telemetry & Observability
//!
//! Structured logging for harness runs.
//! Features:
//! - Scenario spans with timing and outcome
//! - Session state transition logging
//! - Per-exchange debug lines (method, path, status, elapsed)
//! - Configurable log levels via RUST_LOG
//! - Redaction of session identifiers and passwords

use regex::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sanitize a string for safe log output by escaping control characters.
/// Response bodies come from a remote service and may embed newlines.
pub fn sanitize_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x1b' => out.push_str("\\e"),
            '\x00' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

static SECRET_PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

fn secret_patterns() -> &'static Vec<(Regex, &'static str)> {
    SECRET_PATTERNS.get_or_init(|| {
        let mut patterns = Vec::new();
        // Session identifiers: 128 hex characters
        if let Ok(re) = Regex::new(r"\b[0-9a-fA-F]{128}\b") {
            patterns.push((re, "[SESSION]"));
        }
        // "password": "..." inside JSON bodies
        if let Ok(re) = Regex::new(r#"(?i)"password"\s*:\s*"[^"]*""#) {
            patterns.push((re, r#""password":"[REDACTED]""#));
        }
        // password=... in query strings or form bodies
        if let Ok(re) = Regex::new(r"(?i)(password|passwd|pwd)\s*=\s*[^&\s]+") {
            patterns.push((re, "$1=[REDACTED]"));
        }
        patterns
    })
}

/// Redact session identifiers and passwords from a string before logging.
pub fn redact_secrets(input: &str) -> String {
    let mut result = input.to_string();
    for (pattern, replacement) in secret_patterns() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Sanitize then redact; every remote-controlled string goes through this.
pub fn safe_log(input: &str) -> String {
    redact_secrets(&sanitize_for_log(input))
}

/// Initialize global tracing subscriber.
/// Tracing stays off unless RUST_LOG is set, so report output is not interleaved with logs.
pub fn init_tracing() {
    if let Ok(filter) = std::env::var("RUST_LOG") {
        init_tracing_with_filter(&filter);
    }
}

/// Initialize tracing at info level (`--verbose`)
pub fn init_tracing_verbose() {
    init_tracing_with_filter("info")
}

/// Initialize with custom filter string
pub fn init_tracing_with_filter(filter: &str) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .with_level(true)
            .compact()
            .with_writer(std::io::stderr);

        let filter_layer = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    });
}

/// Run one scenario inside a `scenario.run` span, recording duration and outcome.
pub async fn track_scenario<Fut, T, E>(scenario: &str, fut: Fut) -> Result<T, E>
where
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let safe_name = sanitize_for_log(scenario);
    let span = info_span!(
        "scenario.run",
        scenario = safe_name.as_str(),
        duration_ms = tracing::field::Empty,
        success = tracing::field::Empty,
        error = tracing::field::Empty,
    );

    let outcome = async {
        info!("Scenario started");
        fut.await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed().as_millis() as u64;
    span.record("duration_ms", duration);
    let _enter = span.enter();
    match &outcome {
        Ok(_) => {
            span.record("success", true);
            info!(duration_ms = duration, "Scenario passed");
        }
        Err(e) => {
            let safe_err = safe_log(&e.to_string());
            span.record("success", false);
            span.record("error", safe_err.as_str());
            error!(
                duration_ms = duration,
                error = safe_err.as_str(),
                "Scenario failed"
            );
        }
    }
    outcome
}

/// Record a session lifecycle transition
pub fn record_session_transition(resource_id: i64, from: &str, to: &str) {
    info!(
        resource_id = resource_id,
        from = sanitize_for_log(from).as_str(),
        to = sanitize_for_log(to).as_str(),
        "Session state transition"
    );
}

/// Initialize tracing for tests with a simple subscriber
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
