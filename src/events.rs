// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Security event taxonomy and recorder.
//!
//! Every denial in the core is reported as a [`SecurityEvent`]. Severity is a
//! pure function of the event kind; nothing a caller attaches to an event can
//! change it. The recorder logs every event under the `security` target at a
//! level matching its severity, counts it in Prometheus, and hands high and
//! critical events to an [`EventSink`] for persistence and alerting.
//!
//! Metadata is recorded as given. Callers redact secrets before attaching them.

use crate::error::CollaboratorError;
use crate::identity::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prometheus::{IntCounterVec, Opts, Registry};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, event, Level};

/// Tracing target for security events.
pub const SECURITY_TARGET: &str = "security";

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Log level the event is emitted at.
    pub const fn log_level(self) -> Level {
        match self {
            Severity::Critical | Severity::High => Level::ERROR,
            Severity::Medium => Level::WARN,
            Severity::Low => Level::INFO,
        }
    }

    /// High and critical events go to durable storage and alerting.
    pub const fn requires_escalation(self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

/// Security event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    AuthFailure,
    AuthSuccess,
    AuthzFailure,
    RateLimitExceeded,
    SuspiciousInput,
    AdminAction,
    CsrfViolation,
    IdorAttempt,
    SsrfAttempt,
    AccountBlocked,
    AccountDeleted,
    InvalidEndpoint,
    CronAuthFailure,
}

impl SecurityEventKind {
    pub const ALL: [SecurityEventKind; 13] = [
        SecurityEventKind::AuthFailure,
        SecurityEventKind::AuthSuccess,
        SecurityEventKind::AuthzFailure,
        SecurityEventKind::RateLimitExceeded,
        SecurityEventKind::SuspiciousInput,
        SecurityEventKind::AdminAction,
        SecurityEventKind::CsrfViolation,
        SecurityEventKind::IdorAttempt,
        SecurityEventKind::SsrfAttempt,
        SecurityEventKind::AccountBlocked,
        SecurityEventKind::AccountDeleted,
        SecurityEventKind::InvalidEndpoint,
        SecurityEventKind::CronAuthFailure,
    ];

    /// Static severity table.
    pub const fn severity(self) -> Severity {
        match self {
            SecurityEventKind::AuthSuccess => Severity::Low,
            SecurityEventKind::AuthFailure
            | SecurityEventKind::RateLimitExceeded
            | SecurityEventKind::AdminAction
            | SecurityEventKind::AccountDeleted
            | SecurityEventKind::InvalidEndpoint => Severity::Medium,
            SecurityEventKind::AuthzFailure
            | SecurityEventKind::SuspiciousInput
            | SecurityEventKind::CsrfViolation
            | SecurityEventKind::IdorAttempt
            | SecurityEventKind::AccountBlocked
            | SecurityEventKind::CronAuthFailure => Severity::High,
            SecurityEventKind::SsrfAttempt => Severity::Critical,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SecurityEventKind::AuthFailure => "AUTH_FAILURE",
            SecurityEventKind::AuthSuccess => "AUTH_SUCCESS",
            SecurityEventKind::AuthzFailure => "AUTHZ_FAILURE",
            SecurityEventKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            SecurityEventKind::SuspiciousInput => "SUSPICIOUS_INPUT",
            SecurityEventKind::AdminAction => "ADMIN_ACTION",
            SecurityEventKind::CsrfViolation => "CSRF_VIOLATION",
            SecurityEventKind::IdorAttempt => "IDOR_ATTEMPT",
            SecurityEventKind::SsrfAttempt => "SSRF_ATTEMPT",
            SecurityEventKind::AccountBlocked => "ACCOUNT_BLOCKED",
            SecurityEventKind::AccountDeleted => "ACCOUNT_DELETED",
            SecurityEventKind::InvalidEndpoint => "INVALID_ENDPOINT",
            SecurityEventKind::CronAuthFailure => "CRON_AUTH_FAILURE",
        }
    }
}

/// Immutable security event record.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    kind: SecurityEventKind,
    severity: Severity,
    identity: Option<Identity>,
    resource: String,
    action: String,
    success: bool,
    metadata: Map<String, Value>,
    timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// New unsuccessful event; severity is taken from `kind`.
    pub fn new(
        kind: SecurityEventKind,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            identity: None,
            resource: resource.into(),
            action: action.into(),
            success: false,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_identity(mut self, identity: &Identity) -> Self {
        self.identity = Some(identity.clone());
        self
    }

    pub fn succeeded(mut self) -> Self {
        self.success = true;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> SecurityEventKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Durable persistence and alerting for escalated events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn persist(&self, event: &SecurityEvent) -> Result<(), CollaboratorError>;
    async fn alert(&self, event: &SecurityEvent) -> Result<(), CollaboratorError>;
}

/// Sink that relies on the log stream alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlySink;

#[async_trait]
impl EventSink for LogOnlySink {
    async fn persist(&self, _event: &SecurityEvent) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn alert(&self, _event: &SecurityEvent) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Records security events.
#[derive(Clone)]
pub struct SecurityEventRecorder {
    sink: Arc<dyn EventSink>,
    registry: Registry,
    events_total: IntCounterVec,
}

impl SecurityEventRecorder {
    /// Create a recorder with its own metrics registry.
    pub fn new(sink: Arc<dyn EventSink>) -> prometheus::Result<Self> {
        Self::with_registry(sink, Registry::new())
    }

    /// Create a recorder registering its counters in `registry`.
    pub fn with_registry(sink: Arc<dyn EventSink>, registry: Registry) -> prometheus::Result<Self> {
        let events_total = IntCounterVec::new(
            Opts::new(
                "security_events_total",
                "Security events recorded, by kind and severity",
            ),
            &["kind", "severity"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        Ok(Self {
            sink,
            registry,
            events_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of events recorded for `kind` since startup.
    pub fn count(&self, kind: SecurityEventKind) -> u64 {
        self.events_total
            .with_label_values(&[kind.as_str(), kind.severity().as_str()])
            .get()
    }

    /// Emit an event to the log stream and, for high and critical events, to
    /// the persistence and alerting hooks.
    pub async fn record(&self, event: SecurityEvent) {
        let kind = event.kind.as_str();
        let severity = event.severity.as_str();
        let identity = event.identity.as_ref().map(ToString::to_string);
        let metadata = Value::Object(event.metadata.clone());

        self.events_total
            .with_label_values(&[kind, severity])
            .inc();

        macro_rules! emit {
            ($level:expr) => {
                event!(
                    target: SECURITY_TARGET,
                    $level,
                    kind,
                    severity,
                    identity = ?identity,
                    resource = %event.resource,
                    action = %event.action,
                    success = event.success,
                    metadata = %metadata,
                    timestamp = %event.timestamp,
                    "Security event"
                )
            };
        }

        // `event!` needs a constant level.
        let level = event.severity.log_level();
        if level == Level::ERROR {
            emit!(Level::ERROR);
        } else if level == Level::WARN {
            emit!(Level::WARN);
        } else {
            emit!(Level::INFO);
        }

        if event.severity.requires_escalation() {
            if let Err(err) = self.sink.persist(&event).await {
                error!(
                    target: SECURITY_TARGET,
                    kind,
                    error = %err,
                    "Failed to persist security event"
                );
            }
            if let Err(err) = self.sink.alert(&event).await {
                error!(
                    target: SECURITY_TARGET,
                    kind,
                    error = %err,
                    "Failed to raise security alert"
                );
            }
        }
    }
}
