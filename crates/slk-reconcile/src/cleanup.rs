//! Scheduled cleanup sweep.
//!
//! The backstop for bookings whose cancellation event was lost or
//! malformed: every device in the property mapping is listed, and every
//! code whose end time is older than `now - grace` is deleted, subject to
//! the same managed / time-bound filters as cancellation handling.

use chrono::{DateTime, Duration, Utc};
use slk_gateway::passes_type_filters;
use slk_schemas::{parse_offset_timestamp, ProcessOutcome};
use tracing::info;

use crate::engine::ReconcileEngine;

impl ReconcileEngine {
    /// Run the sweep. With `dry_run` set, reports what would be deleted
    /// and issues zero delete calls.
    pub fn cleanup_sweep(&self, now: DateTime<Utc>) -> ProcessOutcome {
        let grace_seconds = (self.cfg.cleanup.grace_days * 86_400.0) as i64;
        let cutoff = now - Duration::seconds(grace_seconds);
        let dry_run = self.cfg.cleanup.dry_run;

        let mut device_ids: Vec<&str> = self
            .cfg
            .properties
            .locks
            .values()
            .map(String::as_str)
            .collect();
        device_ids.sort_unstable();
        device_ids.dedup();

        let mut checked = 0usize;
        let mut deleted = 0usize;

        for device_id in device_ids {
            for code in self.gateway.list_codes(device_id) {
                checked += 1;
                if !passes_type_filters(
                    &code,
                    self.cfg.cleanup.only_managed,
                    self.cfg.cleanup.only_timebound,
                ) {
                    continue;
                }
                let Some(ends_at) = code.ends_at.as_deref().and_then(parse_offset_timestamp)
                else {
                    continue;
                };
                if ends_at > cutoff {
                    continue;
                }
                let Some(access_code_id) = &code.access_code_id else {
                    continue;
                };

                if dry_run {
                    info!(
                        device_id,
                        access_code_id,
                        code = %code.code,
                        ends_at = %ends_at.to_rfc3339(),
                        "dry run: would delete expired access code"
                    );
                    deleted += 1;
                } else if self
                    .gateway
                    .delete_code(access_code_id, Some(device_id))
                    .is_success()
                {
                    deleted += 1;
                }
            }
        }

        info!(checked, deleted, dry_run, "cleanup sweep complete");
        if dry_run {
            ProcessOutcome::accepted(format!(
                "cleanup dry run: checked={checked} would_delete={deleted}"
            ))
        } else {
            ProcessOutcome::accepted(format!("cleanup complete: checked={checked} deleted={deleted}"))
        }
    }
}
