//! # Policy Application Audit Trail
//!
//! One [`PolicyApplicationEvent`] per overlay application and one per
//! exception application, all carrying the run's [`SessionId`] so they can
//! be correlated. Nothing is written for a run where no policy fired.
//!
//! ## Tamper evidence
//!
//! Each event carries a SHA-256 digest of its own canonical form (computed
//! with `digest` unset) via `CanonicalBytes` → `sha256_digest`. Events hold
//! only integers, strings and timestamps, so canonicalization cannot trip
//! over floats.
//!
//! ## Failure contract
//!
//! Sinks return `Result`. [`AuditWriter::write_run`] tries every event and
//! reports the first error; the caller logs it and carries on. An audit
//! failure never changes the discrepancies returned to the caller.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tfcheck_core::{sha256_digest, CanonicalBytes, SessionId, Severity, TenantId};

use crate::apply::{ApplicationType, PolicyOutcome};
use crate::error::AuditError;
use crate::exception::ExceptionEffect;

// ---------------------------------------------------------------------------
// PolicyApplicationEvent
// ---------------------------------------------------------------------------

/// Immutable record of one policy mechanism firing in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyApplicationEvent {
    pub event_id: Uuid,
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    /// What this event records: `overlay` or `exception`.
    pub application_type: ApplicationType,
    /// What fired in the run as a whole (`both` when overlay and exceptions did).
    pub run_application_type: ApplicationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<ExceptionEffect>,
    /// Rule codes this event touched.
    pub rule_codes: Vec<String>,
    pub discrepancies_before: u64,
    pub discrepancies_after: u64,
    pub severity_before: BTreeMap<Severity, u64>,
    pub severity_after: BTreeMap<Severity, u64>,
    pub severity_delta: BTreeMap<Severity, i64>,
    pub processing_time_ms: u64,
    pub recorded_at: DateTime<Utc>,
    /// `sha256:<hex>` over the event with this field unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl PolicyApplicationEvent {
    /// Digest of the event's canonical form, ignoring any stored digest.
    pub fn compute_digest(&self) -> Result<String, AuditError> {
        let unsealed = Self {
            digest: None,
            ..self.clone()
        };
        let canonical = CanonicalBytes::new(&unsealed)?;
        Ok(sha256_digest(&canonical).to_string())
    }

    /// Store the digest.
    pub fn seal(mut self) -> Result<Self, AuditError> {
        self.digest = Some(self.compute_digest()?);
        Ok(self)
    }

    /// Whether the stored digest matches the content.
    pub fn verify(&self) -> bool {
        match (&self.digest, self.compute_digest()) {
            (Some(stored), Ok(computed)) => stored == &computed,
            _ => false,
        }
    }
}

/// Build the events for a run. Empty when no policy fired.
///
/// # Errors
///
/// Canonicalization failure while sealing.
pub fn events_for_run(
    session_id: SessionId,
    tenant_id: &TenantId,
    outcome: &PolicyOutcome,
    recorded_at: DateTime<Utc>,
) -> Result<Vec<PolicyApplicationEvent>, AuditError> {
    let Some(run_type) = outcome.application_type() else {
        return Ok(Vec::new());
    };
    let delta = outcome.delta();
    let base = PolicyApplicationEvent {
        event_id: Uuid::nil(),
        session_id,
        tenant_id: tenant_id.clone(),
        application_type: run_type,
        run_application_type: run_type,
        overlay_id: None,
        exception_id: None,
        effect: None,
        rule_codes: Vec::new(),
        discrepancies_before: outcome.before.discrepancies,
        discrepancies_after: outcome.after.discrepancies,
        severity_before: outcome.before.severity.clone(),
        severity_after: outcome.after.severity.clone(),
        severity_delta: delta.severity,
        processing_time_ms: outcome.processing_time_ms,
        recorded_at,
        digest: None,
    };

    let mut events = Vec::new();
    if let Some(overlay) = &outcome.overlay {
        events.push(PolicyApplicationEvent {
            event_id: Uuid::new_v4(),
            application_type: ApplicationType::Overlay,
            overlay_id: Some(overlay.overlay_id.clone()),
            rule_codes: overlay.rule_codes.clone(),
            ..base.clone()
        });
    }
    for applied in &outcome.exceptions {
        events.push(PolicyApplicationEvent {
            event_id: Uuid::new_v4(),
            application_type: ApplicationType::Exception,
            exception_id: Some(applied.exception_id.clone()),
            effect: Some(applied.effect),
            rule_codes: vec![applied.rule_code.clone()],
            ..base.clone()
        });
    }
    events.into_iter().map(PolicyApplicationEvent::seal).collect()
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Append-only destination for audit events.
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    fn write(&self, event: &PolicyApplicationEvent) -> Result<(), AuditError>;
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<PolicyApplicationEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PolicyApplicationEvent> {
        self.events.lock().clone()
    }

    pub fn events_for_session(&self, session_id: SessionId) -> Vec<PolicyApplicationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn write(&self, event: &PolicyApplicationEvent) -> Result<(), AuditError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event back from a JSONL audit log.
    pub fn read_all(path: &Path) -> Result<Vec<PolicyApplicationEvent>, AuditError> {
        let text = std::fs::read_to_string(path).map_err(|source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(AuditError::from))
            .collect()
    }
}

impl AuditSink for JsonlAuditSink {
    fn write(&self, event: &PolicyApplicationEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let io_err = |source| AuditError::Io {
            path: self.path.clone(),
            source,
        };
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)
    }
}

/// Discards events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn write(&self, _event: &PolicyApplicationEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AuditWriter
// ---------------------------------------------------------------------------

/// Turns a policy outcome into events and hands them to a sink.
#[derive(Debug, Clone)]
pub struct AuditWriter {
    sink: Arc<dyn AuditSink>,
}

impl AuditWriter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// Write the run's events. Returns how many were written.
    ///
    /// Every event is attempted even after a failure.
    ///
    /// # Errors
    ///
    /// The first sealing or sink error.
    pub fn write_run(
        &self,
        session_id: SessionId,
        tenant_id: &TenantId,
        outcome: &PolicyOutcome,
        recorded_at: DateTime<Utc>,
    ) -> Result<usize, AuditError> {
        let events = events_for_run(session_id, tenant_id, outcome, recorded_at)?;
        let mut written = 0;
        let mut first_error = None;
        for event in &events {
            match self.sink.write(event) {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::debug!(event = %event.event_id, error = %e, "audit event not written");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                if written > 0 {
                    tracing::debug!(session = %session_id, tenant = %tenant_id, written, "policy audit events written");
                }
                Ok(written)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply_policy;
    use crate::exception::PolicyException;
    use crate::overlay::PolicyOverlay;
    use chrono::TimeZone;
    use tfcheck_core::{Discrepancy, ScopeContext};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn tenant() -> TenantId {
        TenantId::new("bank-a").unwrap()
    }

    fn outcome() -> PolicyOutcome {
        let list = vec![
            Discrepancy::new("R-1", "t", "d").with_outcome(false, Severity::Critical, "", ""),
            Discrepancy::new("R-2", "t", "d").with_outcome(false, Severity::Major, "", ""),
        ];
        let overlay = PolicyOverlay::new("ov-1", tenant()).with_severity_override(Severity::Major);
        let exceptions = vec![
            PolicyException::new("ex-1", tenant(), "R-1", ExceptionEffect::Waive, t0()),
            PolicyException::new("ex-2", tenant(), "R-2", ExceptionEffect::Downgrade, t0()),
        ];
        apply_policy(list, Some(&overlay), &exceptions, &ScopeContext::default(), t0())
    }

    #[test]
    fn one_event_per_application_sharing_session() {
        let session = SessionId::new();
        let events = events_for_run(session, &tenant(), &outcome(), t0()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].application_type, ApplicationType::Overlay);
        assert_eq!(events[0].rule_codes, vec!["R-1", "R-2"]);
        assert_eq!(events[1].exception_id.as_deref(), Some("ex-1"));
        assert_eq!(events[2].effect, Some(ExceptionEffect::Downgrade));
        for e in &events {
            assert_eq!(e.session_id, session);
            assert_eq!(e.run_application_type, ApplicationType::Both);
            assert_eq!(e.discrepancies_before, 2);
            assert_eq!(e.discrepancies_after, 1);
            assert!(e.verify());
        }
        assert_ne!(events[1].event_id, events[2].event_id);
    }

    #[test]
    fn nothing_fired_means_no_events() {
        let out = PolicyOutcome::unchanged(vec![]);
        assert!(events_for_run(SessionId::new(), &tenant(), &out, t0()).unwrap().is_empty());
    }

    #[test]
    fn tampering_breaks_the_digest() {
        let mut event = events_for_run(SessionId::new(), &tenant(), &outcome(), t0())
            .unwrap()
            .remove(0);
        event.discrepancies_after = 0;
        assert!(!event.verify());
    }

    #[test]
    fn jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy_audit.jsonl");
        let writer = AuditWriter::new(Arc::new(JsonlAuditSink::new(&path)));
        let session = SessionId::new();
        assert_eq!(writer.write_run(session, &tenant(), &outcome(), t0()).unwrap(), 3);
        assert_eq!(writer.write_run(session, &tenant(), &outcome(), t0()).unwrap(), 3);
        let events = JsonlAuditSink::read_all(&path).unwrap();
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(PolicyApplicationEvent::verify));
    }

    #[test]
    fn jsonl_sink_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("missing").join("audit.jsonl"));
        let writer = AuditWriter::new(Arc::new(sink));
        let err = writer
            .write_run(SessionId::new(), &tenant(), &outcome(), t0())
            .unwrap_err();
        assert!(matches!(err, AuditError::Io { .. }));
    }

    #[test]
    fn memory_sink_filters_by_session() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let writer = AuditWriter::new(sink.clone());
        let a = SessionId::new();
        writer.write_run(a, &tenant(), &outcome(), t0()).unwrap();
        writer.write_run(SessionId::new(), &tenant(), &outcome(), t0()).unwrap();
        assert_eq!(sink.len(), 6);
        assert_eq!(sink.events_for_session(a).len(), 3);
        assert_eq!(
            AuditWriter::new(Arc::new(NullAuditSink))
                .write_run(a, &tenant(), &outcome(), t0())
                .unwrap(),
            3
        );
    }
}
