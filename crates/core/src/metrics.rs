//! Metrics definitions for the StringSync backend.
//!
//! This module defines all metrics used throughout the application.
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "pages_served_total",
        "Total number of paginated queries served, labeled by entity"
    );
    describe_histogram!(
        "page_query_duration_seconds",
        "Time taken to resolve a paginated query in seconds"
    );
    describe_counter!("users_signed_up_total", "Total number of user signups");
    describe_counter!(
        "sessions_created_total",
        "Total number of login sessions created"
    );
    describe_counter!(
        "emails_sent_total",
        "Total number of notification emails sent, labeled by kind"
    );
}

/// Record a served page.
///
/// # Arguments
/// * `entity` - The paged entity type ("users" or "notations")
pub fn record_page_served(entity: &str) {
    counter!("pages_served_total", "entity" => entity.to_string()).increment(1);
}

/// Record page query duration.
pub fn record_page_query_duration(duration_secs: f64) {
    histogram!("page_query_duration_seconds").record(duration_secs);
}

/// Record a completed signup.
pub fn record_user_signed_up() {
    counter!("users_signed_up_total").increment(1);
}

/// Record a created login session.
pub fn record_session_created() {
    counter!("sessions_created_total").increment(1);
}

/// Record a sent notification email.
///
/// # Arguments
/// * `kind` - The email kind ("confirmation" or "reset_password")
pub fn record_email_sent(kind: &str) {
    counter!("emails_sent_total", "kind" => kind.to_string()).increment(1);
}

/// A timer that automatically records page query duration when dropped.
pub struct PageQueryTimer {
    start: Instant,
}

impl PageQueryTimer {
    /// Start a new page query timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for PageQueryTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageQueryTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_page_query_duration(duration);
    }
}
