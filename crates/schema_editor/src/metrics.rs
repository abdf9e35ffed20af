use errors::ErrorMetadata;
use metrics::{
    log_counter,
    log_counter_with_labels,
    register_schema_editor_counter,
    register_schema_editor_histogram,
    MetricLabel,
    StatusTimer,
    Timer,
    STATUS_LABEL,
};

use crate::edit_status::{
    EditStatus,
    StatusSummary,
};

register_schema_editor_histogram!(
    MERGE_SECONDS,
    "Time to diff a working copy against its baseline and build the merged tree"
);
pub fn merge_timer() -> Timer {
    Timer::new(&MERGE_SECONDS)
}

register_schema_editor_counter!(
    CLASSIFIED_OBJECTS_TOTAL,
    "Number of schema objects classified by a merge, by edit status",
    &["status"]
);
pub fn log_classified_objects(summary: StatusSummary) {
    for (status, count) in [
        (EditStatus::Created, summary.created),
        (EditStatus::Updated, summary.updated),
        (EditStatus::Dropped, summary.dropped),
    ] {
        if count > 0 {
            log_counter_with_labels(
                &CLASSIFIED_OBJECTS_TOTAL,
                count as u64,
                vec![MetricLabel::new("status", status.to_string())],
            );
        }
    }
}

register_schema_editor_histogram!(
    APPLY_SECONDS,
    "Time to strip dropped objects and unused configs from a schema tree"
);
pub fn apply_timer() -> Timer {
    Timer::new(&APPLY_SECONDS)
}

register_schema_editor_histogram!(
    SELECTIVE_APPLY_SECONDS,
    "Time to project the selected edits onto the baseline"
);
pub fn selective_apply_timer() -> Timer {
    Timer::new(&SELECTIVE_APPLY_SECONDS)
}

register_schema_editor_histogram!(
    DDL_DIFF_REQUEST_SECONDS,
    "Time taken by a DDL diff request, including validation",
    &STATUS_LABEL
);
pub fn ddl_diff_timer() -> StatusTimer {
    StatusTimer::new(&DDL_DIFF_REQUEST_SECONDS)
}

register_schema_editor_counter!(
    DDL_DIFF_VALIDATION_ERRORS,
    "Number of validation errors that blocked a DDL diff request"
);
pub fn log_validation_errors(count: usize) {
    log_counter(&DDL_DIFF_VALIDATION_ERRORS, count as u64);
}

/// Counts a failed DDL diff request by its error classification.
pub fn log_ddl_diff_error(error: &anyhow::Error) {
    if let Some(counter) = error
        .downcast_ref::<ErrorMetadata>()
        .and_then(ErrorMetadata::custom_metric)
    {
        log_counter(counter, 1);
    }
}
