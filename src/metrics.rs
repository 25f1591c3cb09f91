//! Scheduling metrics
//!
//! Thin wrappers around the `metrics` facade so every call site records the
//! same metric names and label sets. Without an installed recorder these are
//! no-ops.
//!
//! # Metrics
//!
//! - `sessions_created_total`: Counter of created sessions
//! - `proposals_submitted_total`: Counter of accepted proposal batches
//! - `proposed_slots_total`: Counter of slots in accepted batches
//! - `proposals_rejected_total`: Counter of rejected proposals by reason
//! - `sessions_finalized_total`: Counter of finalizations by mode
//! - `notifications_total`: Counter of confirmation messages by status
//! - `feedback_submitted_total`: Counter of feedback entries

use metrics::{counter, increment_counter};

/// Records a newly created session
pub fn record_session_created() {
    increment_counter!("sessions_created_total");
}

/// Records an accepted proposal batch of `slot_count` slots
pub fn record_proposal_submitted(slot_count: usize) {
    increment_counter!("proposals_submitted_total");
    counter!("proposed_slots_total", slot_count as u64);
}

/// Records a rejected proposal
///
/// # Arguments
///
/// * `reason` - Short rejection reason ("slot_count", "forbidden", "deadline")
pub fn record_proposal_rejected(reason: &str) {
    increment_counter!("proposals_rejected_total", "reason" => reason.to_string());
}

/// Records a committed finalization
///
/// # Arguments
///
/// * `mode` - "auto" or "manual"
pub fn record_session_finalized(mode: &str) {
    increment_counter!("sessions_finalized_total", "mode" => mode.to_string());
}

/// Records one notification attempt
///
/// # Arguments
///
/// * `status` - "delivered" or "failed"
pub fn record_notification(status: &str) {
    increment_counter!("notifications_total", "status" => status.to_string());
}

/// Records a feedback submission
pub fn record_feedback_submitted() {
    increment_counter!("feedback_submitted_total");
}

/// Initialize metrics exporter
///
/// Sets up the metrics exporter if the prometheus feature is enabled.
/// This should be called once at application startup.
///
/// # Examples
///
/// ```
/// use studysync::metrics::init_metrics_exporter;
///
/// // Only does something with the prometheus feature
/// init_metrics_exporter();
/// ```
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}
