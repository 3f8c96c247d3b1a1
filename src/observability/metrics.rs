//! Metrics recording functions.
//!
//! Everything goes through the `metrics` facade; without an installed recorder
//! these calls are no-ops.

use std::time::Duration;

/// Record OCR operation metrics
pub fn record_ocr_metrics(success: bool, duration: Duration, image_size: u64) {
    metrics::counter!("ocr_operations_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("ocr_image_size_bytes").record(image_size as f64);
}

/// Record preprocessing time and outcome
pub fn record_preprocessing_metrics(success: bool, duration: Duration, downscaled: bool) {
    metrics::counter!("preprocess_operations_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("preprocess_duration_seconds").record(duration.as_secs_f64());
    if downscaled {
        metrics::counter!("preprocess_downscaled_total").increment(1);
    }
}

/// Record a slot commit, split by whether a candidate was found
pub fn record_slot_commit(ocr_failed: bool) {
    metrics::counter!("slots_committed_total", "result" => if ocr_failed { "failed" } else { "extracted" }).increment(1);
}

/// Record queue/depth metrics
pub fn record_queue_metrics(queue_name: &str, depth: usize, capacity: usize) {
    let queue_name = queue_name.to_string();
    metrics::gauge!("queue_depth", "queue" => queue_name.clone()).set(depth as f64);
    metrics::gauge!("queue_capacity", "queue" => queue_name).set(capacity as f64);
}

/// Record items turned away because the queue was full
pub fn record_queue_rejections(rejected: usize) {
    if rejected > 0 {
        metrics::counter!("queue_rejected_total").increment(rejected as u64);
    }
}

/// Record a finished batch run
pub fn record_batch_metrics(outcome: &str, items: usize, failed: usize, duration: Duration) {
    let outcome = outcome.to_string();
    metrics::counter!("batch_runs_total", "outcome" => outcome).increment(1);
    metrics::histogram!("batch_items").record(items as f64);
    metrics::histogram!("batch_failed_items").record(failed as f64);
    metrics::histogram!("batch_duration_seconds").record(duration.as_secs_f64());
}

/// Record a storage write or read
pub fn record_persist_metrics(operation: &str, success: bool, duration: Duration) {
    let operation = operation.to_string();
    metrics::counter!(
        "persist_operations_total",
        "operation" => operation,
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
    metrics::histogram!("persist_duration_seconds").record(duration.as_secs_f64());
}

/// Record pages appended to satisfy a batch
pub fn record_pages_created(count: usize) {
    if count > 0 {
        metrics::counter!("pages_created_total").increment(count as u64);
    }
}

/// Record error rate metrics
pub fn record_error_metrics(error_type: &str, component: &str) {
    let error_type = error_type.to_string();
    let component = component.to_string();
    metrics::counter!("errors_total", "type" => error_type, "component" => component).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_ocr_metrics(true, Duration::from_millis(120), 2048);
        record_preprocessing_metrics(false, Duration::from_millis(3), false);
        record_slot_commit(true);
        record_queue_metrics("pending", 3, 200);
        record_queue_rejections(2);
        record_batch_metrics("completed", 3, 1, Duration::from_secs(2));
        record_persist_metrics("write", true, Duration::from_millis(1));
        record_pages_created(1);
        record_error_metrics("decode", "preprocessing");
    }
}
