//! Metrics collection for Temuan.
//!
//! Counters go through the `metrics` facade. The collector also keeps a
//! process-local tally so callers can read totals without a recorder.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of an officer's claim review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "approved",
            ReviewDecision::Rejected => "rejected",
        }
    }
}

/// Totals recorded since the collector was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub items_recorded: u64,
    pub items_returned: u64,
    pub claims_submitted: u64,
    pub claims_approved: u64,
    pub claims_rejected: u64,
    pub uploads: u64,
    pub failed_logins: u64,
}

/// Records domain and security metrics.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    items_recorded: AtomicU64,
    items_returned: AtomicU64,
    claims_submitted: AtomicU64,
    claims_approved: AtomicU64,
    claims_rejected: AtomicU64,
    uploads: AtomicU64,
    failed_logins: AtomicU64,
}

impl MetricsCollector {
    /// Creates a new metrics collector and registers metric descriptions.
    pub fn new() -> Self {
        Self::register_metrics();
        Self::default()
    }

    fn register_metrics() {
        describe_counter!(
            "temuan_items_recorded_total",
            "Total number of found items recorded"
        );
        describe_counter!(
            "temuan_items_returned_total",
            "Total number of items handed back to their owners"
        );
        describe_counter!(
            "temuan_claims_submitted_total",
            "Total number of claims submitted"
        );
        describe_counter!(
            "temuan_claims_reviewed_total",
            "Total number of claims reviewed by officers"
        );
        describe_counter!("temuan_uploads_total", "Total number of photos uploaded");

        describe_gauge!(
            "temuan_db_pool_size",
            "Current number of connections in the database pool"
        );
        describe_gauge!(
            "temuan_db_pool_idle",
            "Number of idle connections in the database pool"
        );

        describe_counter!(
            "temuan_login_attempts_total",
            "Total number of login attempts"
        );
        describe_counter!(
            "temuan_rate_limit_exceeded_total",
            "Total number of rate limit exceeded events"
        );
    }

    /// Records a newly recorded item.
    pub fn record_item_recorded(&self, category: &str) {
        self.items_recorded.fetch_add(1, Ordering::Relaxed);
        counter!("temuan_items_recorded_total", "category" => category.to_string()).increment(1);
    }

    /// Records an item handed back. `via` is "claim" or "direct".
    pub fn record_item_returned(&self, via: &'static str) {
        self.items_returned.fetch_add(1, Ordering::Relaxed);
        counter!("temuan_items_returned_total", "via" => via).increment(1);
    }

    pub fn record_claim_submitted(&self) {
        self.claims_submitted.fetch_add(1, Ordering::Relaxed);
        counter!("temuan_claims_submitted_total").increment(1);
    }

    pub fn record_claim_reviewed(&self, decision: ReviewDecision) {
        match decision {
            ReviewDecision::Approved => self.claims_approved.fetch_add(1, Ordering::Relaxed),
            ReviewDecision::Rejected => self.claims_rejected.fetch_add(1, Ordering::Relaxed),
        };
        counter!("temuan_claims_reviewed_total", "decision" => decision.as_str()).increment(1);
    }

    pub fn record_upload(&self, content_type: &str) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
        counter!("temuan_uploads_total", "content_type" => content_type.to_string()).increment(1);
    }

    // Database metrics

    /// Records database pool size and idle connections.
    pub fn record_db_pool(&self, size: u32, idle: usize) {
        gauge!("temuan_db_pool_size").set(size as f64);
        gauge!("temuan_db_pool_idle").set(idle as f64);
    }

    // Security metrics

    /// Records a login attempt.
    pub fn record_login_attempt(&self, success: bool) {
        if !success {
            self.failed_logins.fetch_add(1, Ordering::Relaxed);
        }
        let status = if success { "success" } else { "failure" };
        counter!("temuan_login_attempts_total", "status" => status).increment(1);
    }

    /// Records a rate limit exceeded event.
    pub fn record_rate_limit_exceeded(&self, endpoint: &str) {
        counter!("temuan_rate_limit_exceeded_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }

    /// Returns the totals recorded so far.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_recorded: self.items_recorded.load(Ordering::Relaxed),
            items_returned: self.items_returned.load(Ordering::Relaxed),
            claims_submitted: self.claims_submitted.load(Ordering::Relaxed),
            claims_approved: self.claims_approved.load(Ordering::Relaxed),
            claims_rejected: self.claims_rejected.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
            failed_logins: self.failed_logins.load(Ordering::Relaxed),
        }
    }
}
