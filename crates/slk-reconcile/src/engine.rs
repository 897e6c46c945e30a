//! Engine orchestration: event dispatch, provisioning, cancellation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use slk_config::SyncConfig;
use slk_gateway::{passes_type_filters, AccessBackend, CreateCodeRequest, CreateOutcome, RemoteCode};
use slk_normalizer::{build_window, derive_code, mask_phone, normalize, InboundEvent};
use slk_notify::{compose_confirmation, Notifier};
use slk_schemas::{
    parse_offset_timestamp, within_minutes, BatchOutcome, Booking, CodeSource, IdempotencyRecord,
    ProcessOutcome, StayWindow,
};
use slk_store::BookingStore;
use tracing::{error, info, warn};

use crate::plan::{classify, next_action, DesiredCode, PlannedAction};

/// Statuses that drive provisioning.
const CONFIRMED_STATUSES: &[&str] = &["booked", "confirmed"];

/// Result of one engine invocation: a single outcome, or positional
/// results for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Single(ProcessOutcome),
    Batch(BatchOutcome),
}

impl EngineOutcome {
    pub fn is_fully_accepted(&self) -> bool {
        match self {
            EngineOutcome::Single(outcome) => outcome.is_accepted(),
            EngineOutcome::Batch(batch) => batch.results.iter().all(ProcessOutcome::is_accepted),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            EngineOutcome::Single(outcome) => {
                serde_json::to_value(outcome).unwrap_or(Value::Null)
            }
            EngineOutcome::Batch(batch) => serde_json::to_value(batch).unwrap_or(Value::Null),
        }
    }
}

/// The reconciliation engine. Holds the immutable config plus the three
/// collaborator seams; constructed once per invocation.
pub struct ReconcileEngine {
    pub(crate) cfg: SyncConfig,
    name_to_id: BTreeMap<String, String>,
    pub(crate) gateway: Box<dyn AccessBackend>,
    store: Box<dyn BookingStore>,
    notifier: Box<dyn Notifier>,
}

impl ReconcileEngine {
    pub fn new(
        cfg: SyncConfig,
        gateway: Box<dyn AccessBackend>,
        store: Box<dyn BookingStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let name_to_id = cfg.name_to_id();
        Self {
            cfg,
            name_to_id,
            gateway,
            store,
            notifier,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.cfg
    }

    /// Classify and process one raw payload.
    pub fn process_value(&self, payload: &Value, now: DateTime<Utc>) -> EngineOutcome {
        match InboundEvent::classify(payload, &self.cfg.events.scheduler_source) {
            Ok(event) => self.process_event(&event, now),
            Err(e) => {
                error!(%e, "rejecting payload at the boundary");
                EngineOutcome::Single(ProcessOutcome::rejected(format!("invalid payload: {e}")))
            }
        }
    }

    /// Process an already-classified event. Batches run strictly
    /// sequentially; one failing item never stops the rest.
    pub fn process_event(&self, event: &InboundEvent, now: DateTime<Utc>) -> EngineOutcome {
        match event {
            InboundEvent::Cleanup => EngineOutcome::Single(self.cleanup_sweep(now)),
            InboundEvent::Single(data) => EngineOutcome::Single(self.process_item(data, now)),
            InboundEvent::Batch(items) => {
                let results = items
                    .iter()
                    .map(|item| self.process_item(item, now))
                    .collect();
                EngineOutcome::Batch(BatchOutcome::from_results(results))
            }
        }
    }

    fn process_item(&self, data: &Value, now: DateTime<Utc>) -> ProcessOutcome {
        let booking = normalize(data, &self.name_to_id);
        info!(
            booking_id = %booking.booking_id,
            status = %booking.status,
            action = %booking.action,
            "event received"
        );

        // Cancellation wins when an event carries both signals.
        if self.is_cancellation(&booking) {
            self.handle_cancellation(&booking)
        } else if CONFIRMED_STATUSES.contains(&booking.status.as_str()) {
            self.handle_confirmed(&booking, now)
        } else {
            info!(booking_id = %booking.booking_id, status = %booking.status, "skipping event");
            ProcessOutcome::accepted("skipped: not a confirmed or cancellation event")
        }
    }

    fn is_cancellation(&self, booking: &Booking) -> bool {
        self.cfg.is_cancelled_status(&booking.status) || self.cfg.is_cancel_action(&booking.action)
    }

    // -----------------------------------------------------------------------
    // Provisioning
    // -----------------------------------------------------------------------

    fn handle_confirmed(&self, booking: &Booking, now: DateTime<Utc>) -> ProcessOutcome {
        let Some(property_id) = booking.property_id.as_deref() else {
            return ProcessOutcome::rejected("missing property id");
        };
        let Some(device_id) = self.cfg.device_for(property_id) else {
            return ProcessOutcome::rejected("no lock mapping found for property");
        };

        let Some((code, code_source)) = derive_code(&booking.guest_phone, &booking.booking_id)
        else {
            return ProcessOutcome::rejected("missing guest phone number and booking id");
        };
        // The booking-id-derived code, kept aside for duplicate
        // collisions; only useful when it differs from the primary.
        let fallback_code = derive_code("", &booking.booking_id)
            .map(|(c, _)| c)
            .filter(|c| *c != code);

        let tz = match self.cfg.timezone_for(property_id) {
            Ok(tz) => tz,
            Err(e) => return ProcessOutcome::rejected(format!("{e}")),
        };
        let window = match build_window(
            booking.arrival_raw.as_deref(),
            booking.departure_raw.as_deref(),
            tz,
            self.cfg.checkin_time(),
            self.cfg.checkout_time(),
        ) {
            Ok(w) => w,
            Err(e) => return ProcessOutcome::rejected(e.to_string()),
        };

        let desired = DesiredCode {
            device_id: device_id.to_string(),
            code,
            window,
        };
        let existing = self.store_get(&booking.booking_id);

        match next_action(classify(
            existing.as_ref(),
            &desired,
            self.cfg.matching.tolerance_minutes,
        )) {
            PlannedAction::Keep => {
                info!(booking_id = %booking.booking_id, "idempotent hit; no update needed");
                ProcessOutcome::accepted("access code already up to date")
            }
            PlannedAction::ReplaceThenCreate => {
                info!(
                    booking_id = %booking.booking_id,
                    "booking change detected; replacing code window"
                );
                if let Some(record) = &existing {
                    if !self.delete_recorded_code(record, device_id) {
                        warn!(
                            booking_id = %booking.booking_id,
                            "previous code deletion failed; continuing with re-provisioning"
                        );
                    }
                }
                self.provision(booking, property_id, &desired, code_source, fallback_code, now)
            }
            PlannedAction::Create => {
                self.provision(booking, property_id, &desired, code_source, fallback_code, now)
            }
        }
    }

    fn provision(
        &self,
        booking: &Booking,
        property_id: &str,
        desired: &DesiredCode,
        code_source: CodeSource,
        fallback_code: Option<String>,
        now: DateTime<Utc>,
    ) -> ProcessOutcome {
        info!(
            booking_id = %booking.booking_id,
            property_id,
            code = %desired.code,
            source = code_source.as_str(),
            phone = %mask_phone(&booking.guest_phone),
            starts_at = %desired.window.starts_at.to_rfc3339(),
            ends_at = %desired.window.ends_at.to_rfc3339(),
            "creating access code"
        );

        let request = CreateCodeRequest {
            device_id: desired.device_id.clone(),
            code: desired.code.clone(),
            name: booking.guest_name.clone(),
            window: desired.window,
        };

        match self.gateway.create_code(&request) {
            CreateOutcome::Created { access_code_id } => {
                self.persist(booking, property_id, desired, access_code_id, code_source, now);
                self.send_confirmation(booking, property_id, &desired.code, &desired.window);
                ProcessOutcome::accepted("access code created successfully")
            }
            CreateOutcome::Duplicate => {
                self.resolve_duplicate(booking, property_id, desired, fallback_code, now, false)
            }
            CreateOutcome::Failed { message, .. } => {
                ProcessOutcome::remote_failure(non_empty_or(message, "failed to create access code"))
            }
        }
    }

    /// The service reported a duplicate instead of confirming creation.
    /// Search for the colliding code; a hit is idempotent success (the code
    /// was already communicated, so no notification). A miss gets exactly
    /// one fallback create attempt when a distinct fallback code exists.
    fn resolve_duplicate(
        &self,
        booking: &Booking,
        property_id: &str,
        desired: &DesiredCode,
        fallback_code: Option<String>,
        now: DateTime<Utc>,
        fallback_attempt: bool,
    ) -> ProcessOutcome {
        let found = self.gateway.find_matching(
            &desired.device_id,
            &desired.code,
            &desired.window,
            self.cfg.matching.tolerance_minutes,
        );
        if let Some(found) = found {
            let source = if fallback_attempt {
                CodeSource::BookingIdFallbackExisting
            } else {
                CodeSource::Existing
            };
            self.persist(booking, property_id, desired, found.access_code_id, source, now);
            info!(
                booking_id = %booking.booking_id,
                "access code already exists; skipping notification"
            );
            return ProcessOutcome::accepted("access code already exists");
        }

        if !fallback_attempt {
            if let Some(fallback) = fallback_code {
                info!(
                    booking_id = %booking.booking_id,
                    code = %fallback,
                    "duplicate collision; retrying with booking-id fallback code"
                );
                let fb_desired = DesiredCode {
                    device_id: desired.device_id.clone(),
                    code: fallback,
                    window: desired.window,
                };
                let request = CreateCodeRequest {
                    device_id: fb_desired.device_id.clone(),
                    code: fb_desired.code.clone(),
                    name: booking.guest_name.clone(),
                    window: fb_desired.window,
                };
                return match self.gateway.create_code(&request) {
                    CreateOutcome::Created { access_code_id } => {
                        self.persist(
                            booking,
                            property_id,
                            &fb_desired,
                            access_code_id,
                            CodeSource::BookingIdFallback,
                            now,
                        );
                        self.send_confirmation(
                            booking,
                            property_id,
                            &fb_desired.code,
                            &fb_desired.window,
                        );
                        ProcessOutcome::accepted("access code created successfully")
                    }
                    CreateOutcome::Duplicate => {
                        self.resolve_duplicate(booking, property_id, &fb_desired, None, now, true)
                    }
                    CreateOutcome::Failed { message, .. } => ProcessOutcome::remote_failure(
                        non_empty_or(message, "failed to create fallback access code"),
                    ),
                };
            }
        }

        error!(
            booking_id = %booking.booking_id,
            code = %desired.code,
            "unresolved duplicate access code collision"
        );
        ProcessOutcome::remote_failure("duplicate access code could not be resolved")
    }

    fn persist(
        &self,
        booking: &Booking,
        property_id: &str,
        desired: &DesiredCode,
        access_code_id: Option<String>,
        code_source: CodeSource,
        now: DateTime<Utc>,
    ) {
        if booking.booking_id.is_empty() {
            warn!("event has no booking id; skipping idempotency record");
            return;
        }
        let expires_at = (self.cfg.store.ttl_days > 0)
            .then(|| desired.window.ends_at.timestamp() + self.cfg.store.ttl_days * 86_400);
        let record = IdempotencyRecord {
            booking_id: booking.booking_id.clone(),
            property_id: property_id.to_string(),
            device_id: desired.device_id.clone(),
            access_code_id,
            code: desired.code.clone(),
            starts_at: desired.window.starts_at,
            ends_at: desired.window.ends_at,
            guest_name: booking.guest_name.clone(),
            code_source,
            updated_at: now,
            expires_at,
        };
        self.store_put(&record);
    }

    fn send_confirmation(
        &self,
        booking: &Booking,
        property_id: &str,
        code: &str,
        window: &StayWindow,
    ) {
        let recipient = self.cfg.notify.email.trim();
        if recipient.is_empty() {
            warn!("notify recipient not configured; skipping confirmation");
            return;
        }
        let property_name = self
            .cfg
            .display_name_for(property_id)
            .map(str::to_string)
            .or_else(|| booking.property_name.clone())
            .unwrap_or_else(|| "Your Rental".to_string());
        let message = compose_confirmation(&booking.guest_name, &property_name, code, window);
        if let Err(e) = self.notifier.send(recipient, &message.subject, &message.body) {
            error!(%e, "confirmation send failed");
        }
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    fn handle_cancellation(&self, booking: &Booking) -> ProcessOutcome {
        let Some(property_id) = booking.property_id.as_deref() else {
            return ProcessOutcome::rejected("missing property id");
        };
        let Some(device_id) = self.cfg.device_for(property_id) else {
            return ProcessOutcome::rejected("no lock mapping found for property");
        };

        // Record path first: the stored remote identifier is the most
        // precise deletion available. A stale identifier the service
        // reports as already gone still counts as a confirmed delete.
        if let Some(record) = self.store_get(&booking.booking_id) {
            if self.delete_recorded_code(&record, device_id) {
                self.store_delete(&booking.booking_id);
                return ProcessOutcome::accepted("deleted access code from idempotency record");
            }
            warn!(
                booking_id = %booking.booking_id,
                "recorded code deletion failed; falling back to search"
            );
        }

        let Some((code, code_source)) = derive_code(&booking.guest_phone, &booking.booking_id)
        else {
            return ProcessOutcome::rejected("missing phone and booking id");
        };

        let tz = match self.cfg.timezone_for(property_id) {
            Ok(tz) => tz,
            Err(e) => return ProcessOutcome::rejected(format!("{e}")),
        };
        let window = match build_window(
            booking.arrival_raw.as_deref(),
            booking.departure_raw.as_deref(),
            tz,
            self.cfg.checkin_time(),
            self.cfg.checkout_time(),
        ) {
            Ok(w) => w,
            Err(e) => return ProcessOutcome::rejected(e.to_string()),
        };

        info!(
            booking_id = %booking.booking_id,
            property_id,
            device_id,
            code = %code,
            source = code_source.as_str(),
            phone = %mask_phone(&booking.guest_phone),
            "cancellation delete"
        );

        let codes = self.gateway.list_codes(device_id);
        let mut matches = filter_cancellation_matches(
            &codes,
            &code,
            &window,
            self.cfg.matching.tolerance_minutes,
            self.cfg.cleanup.only_managed,
            self.cfg.cleanup.only_timebound,
        );

        if matches.is_empty() && self.cfg.matching.allow_code_only {
            // Loose fallback for malformed or legacy codes: may match an
            // unrelated code sharing the same 4 digits on a shared device.
            // Known accuracy risk, kept deliberately.
            warn!(
                booking_id = %booking.booking_id,
                code = %code,
                "no window-qualified match; relaxing to code-value-only matching"
            );
            matches = codes
                .iter()
                .filter(|entry| {
                    entry.code == code
                        && passes_type_filters(
                            entry,
                            self.cfg.cleanup.only_managed,
                            self.cfg.cleanup.only_timebound,
                        )
                })
                .collect();
        }

        if matches.is_empty() {
            info!(booking_id = %booking.booking_id, "no matching access code found");
            return ProcessOutcome::accepted("no matching access code found");
        }

        let mut deleted = 0usize;
        for entry in &matches {
            let Some(access_code_id) = &entry.access_code_id else {
                continue;
            };
            if self
                .gateway
                .delete_code(access_code_id, Some(device_id))
                .is_success()
            {
                deleted += 1;
            }
        }

        if deleted > 0 {
            self.store_delete(&booking.booking_id);
        }
        ProcessOutcome::accepted(format!("deleted {deleted} access code(s)"))
    }

    /// Delete the code a record points at: by stored remote identifier when
    /// present, else by tolerance search over the stored window.
    fn delete_recorded_code(&self, record: &IdempotencyRecord, mapped_device_id: &str) -> bool {
        let device_id = if record.device_id.is_empty() {
            mapped_device_id
        } else {
            &record.device_id
        };

        if let Some(access_code_id) = &record.access_code_id {
            return self
                .gateway
                .delete_code(access_code_id, Some(device_id))
                .is_success();
        }

        let found = self.gateway.find_matching(
            device_id,
            &record.code,
            &record.window(),
            self.cfg.matching.tolerance_minutes,
        );
        match found.and_then(|f| f.access_code_id) {
            Some(access_code_id) => self
                .gateway
                .delete_code(&access_code_id, Some(device_id))
                .is_success(),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Store access (best-effort: every failure is logged and swallowed)
    // -----------------------------------------------------------------------

    pub(crate) fn store_get(&self, booking_id: &str) -> Option<IdempotencyRecord> {
        if booking_id.is_empty() {
            return None;
        }
        match self.store.get(booking_id) {
            Ok(found) => found,
            Err(e) => {
                error!(booking_id, %e, "idempotency read failed; proceeding without record");
                None
            }
        }
    }

    fn store_put(&self, record: &IdempotencyRecord) {
        if let Err(e) = self.store.put(record) {
            error!(booking_id = %record.booking_id, %e, "idempotency write failed");
        }
    }

    fn store_delete(&self, booking_id: &str) {
        if booking_id.is_empty() {
            return;
        }
        if let Err(e) = self.store.delete(booking_id) {
            error!(booking_id, %e, "idempotency delete failed");
        }
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Cancellation match filter: exact code value, managed / time-bound
/// filters, end edge within tolerance of the computed check-out. The start
/// edge is checked only when the remote value parses; legacy codes often
/// omit it.
fn filter_cancellation_matches<'a>(
    codes: &'a [RemoteCode],
    code: &str,
    window: &StayWindow,
    tolerance_minutes: i64,
    only_managed: bool,
    only_timebound: bool,
) -> Vec<&'a RemoteCode> {
    codes
        .iter()
        .filter(|entry| {
            if entry.code != code {
                return false;
            }
            if !passes_type_filters(entry, only_managed, only_timebound) {
                return false;
            }
            match entry.ends_at.as_deref().and_then(parse_offset_timestamp) {
                Some(ends) => {
                    if !within_minutes(ends, window.ends_at, tolerance_minutes) {
                        return false;
                    }
                }
                None => return false,
            }
            match entry.starts_at.as_deref().and_then(parse_offset_timestamp) {
                Some(starts) => within_minutes(starts, window.starts_at, tolerance_minutes),
                None => true,
            }
        })
        .collect()
}
