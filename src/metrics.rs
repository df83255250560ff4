//! Processing metrics, emitted as structured tracing events under the
//! `cla_metrics` target so they can be filtered into a separate sink.

use std::time::Duration;

/// Emitted once per successfully processed delivery. `initial_signed`
/// is only known for `opened` events: whether the contributor already
/// had a signed CLA when the PR arrived.
pub fn delivery_processed(
    owner: &str,
    repo: &str,
    number: i64,
    delivery_id: &str,
    duration: Duration,
    employee: bool,
    initial_signed: Option<bool>,
) {
    tracing::info!(
        target: "cla_metrics",
        owner,
        repo,
        number,
        delivery_id,
        duration_ms = duration.as_millis() as u64,
        employee,
        initial_signed,
        "pull request delivery processed"
    );
}
