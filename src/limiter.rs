// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter keyed by (identity, resource class).
//!
//! Each check is a read-check-write cycle against the [`CounterStore`]:
//!
//! 1. No counter: create `{count: 1, window_start: now}`, allow.
//! 2. Window elapsed: reset to `{count: 1, window_start: now}`, allow.
//! 3. Window active and quota used up: deny without writing.
//! 4. Otherwise increment and allow.
//!
//! Writes are conditional on the counter read at the start of the cycle, so
//! two concurrent requests for the same key can never both claim the last
//! slot. A lost swap restarts the cycle. Counters live only in the store.

use crate::clock::{Clock, SystemClock};
use crate::error::{CollaboratorError, Denial};
use crate::events::{SecurityEvent, SecurityEventKind, SecurityEventRecorder};
use crate::identity::Identity;
use crate::store::{CounterKey, CounterStore, RateLimitCounter};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Upper bound on read-check-write cycles for one check.
pub const MAX_SWAP_ATTEMPTS: usize = 16;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Rate-limited operation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    ReviewSubmission,
    CollectionCreation,
    ReportSubmissionAuthenticated,
    ReportSubmissionAnonymous,
    /// Automated callers, short burst window.
    CronBurst,
    /// Automated callers, long aggregate window.
    CronDaily,
}

impl ResourceClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceClass::ReviewSubmission => "review_submission",
            ResourceClass::CollectionCreation => "collection_creation",
            ResourceClass::ReportSubmissionAuthenticated => "report_submission_authenticated",
            ResourceClass::ReportSubmissionAnonymous => "report_submission_anonymous",
            ResourceClass::CronBurst => "cron_burst",
            ResourceClass::CronDaily => "cron_daily",
        }
    }

    /// Compiled-in policy for this class.
    pub const fn config(self) -> RateLimitConfig {
        match self {
            ResourceClass::ReviewSubmission => REVIEW_SUBMISSION,
            ResourceClass::CollectionCreation => COLLECTION_CREATION,
            ResourceClass::ReportSubmissionAuthenticated => REPORT_SUBMISSION_AUTHENTICATED,
            ResourceClass::ReportSubmissionAnonymous => REPORT_SUBMISSION_ANONYMOUS,
            ResourceClass::CronBurst => CRON_BURST,
            ResourceClass::CronDaily => CRON_DAILY,
        }
    }

    /// Report submissions are split by whether the caller is signed in.
    pub fn report_submission(identity: &Identity) -> Self {
        if identity.is_authenticated() {
            ResourceClass::ReportSubmissionAuthenticated
        } else {
            ResourceClass::ReportSubmissionAnonymous
        }
    }
}

/// Immutable per-class quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_duration_ms: i64,
    pub max_requests: u32,
    pub resource_class: ResourceClass,
}

impl RateLimitConfig {
    pub const fn new(
        resource_class: ResourceClass,
        max_requests: u32,
        window_duration_ms: i64,
    ) -> Self {
        Self {
            window_duration_ms,
            max_requests,
            resource_class,
        }
    }
}

pub const REVIEW_SUBMISSION: RateLimitConfig =
    RateLimitConfig::new(ResourceClass::ReviewSubmission, 10, HOUR_MS);

pub const COLLECTION_CREATION: RateLimitConfig =
    RateLimitConfig::new(ResourceClass::CollectionCreation, 20, DAY_MS);

pub const REPORT_SUBMISSION_AUTHENTICATED: RateLimitConfig =
    RateLimitConfig::new(ResourceClass::ReportSubmissionAuthenticated, 10, HOUR_MS);

pub const REPORT_SUBMISSION_ANONYMOUS: RateLimitConfig =
    RateLimitConfig::new(ResourceClass::ReportSubmissionAnonymous, 3, HOUR_MS);

pub const CRON_BURST: RateLimitConfig =
    RateLimitConfig::new(ResourceClass::CronBurst, 10, MINUTE_MS);

pub const CRON_DAILY: RateLimitConfig =
    RateLimitConfig::new(ResourceClass::CronDaily, 200, DAY_MS);

/// Result of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window ends.
    pub reset_at_ms: i64,
    pub total_requests: u32,
}

impl RateLimitStatus {
    pub fn reset_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.reset_at_ms)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Time from `now_ms` until the window resets.
    pub fn retry_after(&self, now_ms: i64) -> Duration {
        Duration::from_millis((self.reset_at_ms - now_ms).max(0) as u64)
    }
}

/// Why a check could not be completed.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Counter store failure: {0}")]
    Store(#[from] CollaboratorError),

    #[error("Counter contention: gave up after {0} attempts")]
    Contention(usize),

    #[error("Caller identity cannot be attributed")]
    UnattributableIdentity,
}

impl RateLimitError {
    fn reason(&self) -> &'static str {
        match self {
            Self::Store(_) => "store_unavailable",
            Self::Contention(_) => "contention",
            Self::UnattributableIdentity => "unattributable_identity",
        }
    }
}

/// Windowed rate limiter over a shared counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    recorder: SecurityEventRecorder,
}

impl RateLimiter {
    /// Create a limiter using the system clock.
    pub fn new(store: Arc<dyn CounterStore>, recorder: SecurityEventRecorder) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), recorder)
    }

    pub fn with_clock(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        recorder: SecurityEventRecorder,
    ) -> Self {
        Self {
            store,
            clock,
            recorder,
        }
    }

    /// Check the quota for `key` and count the request if it is admitted.
    pub async fn check_and_increment(
        &self,
        key: &CounterKey,
        config: &RateLimitConfig,
    ) -> Result<RateLimitStatus, RateLimitError> {
        for attempt in 0..MAX_SWAP_ATTEMPTS {
            let now = self.clock.now_ms();
            let current = self.store.get(key).await?;

            let next = match current {
                Some(counter) if now - counter.window_start_ms <= config.window_duration_ms => {
                    if counter.request_count >= config.max_requests {
                        debug!(%key, count = counter.request_count, "Quota exhausted");
                        return Ok(RateLimitStatus {
                            allowed: false,
                            remaining: 0,
                            reset_at_ms: counter.window_start_ms + config.window_duration_ms,
                            total_requests: counter.request_count,
                        });
                    }
                    RateLimitCounter {
                        request_count: counter.request_count + 1,
                        window_start_ms: counter.window_start_ms,
                        last_request_ms: now,
                    }
                }
                // Absent, or the previous window has elapsed.
                _ => RateLimitCounter::opened_at(now),
            };

            if self.store.compare_and_swap(key, current, next).await? {
                return Ok(RateLimitStatus {
                    allowed: true,
                    remaining: config.max_requests.saturating_sub(next.request_count),
                    reset_at_ms: next.window_start_ms + config.window_duration_ms,
                    total_requests: next.request_count,
                });
            }

            debug!(%key, attempt, "Counter changed underneath, retrying");
        }

        warn!(%key, "Counter contention, giving up");
        Err(RateLimitError::Contention(MAX_SWAP_ATTEMPTS))
    }

    /// Fail-closed quota check for a caller.
    ///
    /// The unknown network sentinel is denied without touching the store.
    /// Store failures and contention are denials. Every denial is recorded as
    /// a `RATE_LIMIT_EXCEEDED` event.
    pub async fn enforce(
        &self,
        identity: &Identity,
        config: &RateLimitConfig,
    ) -> Result<RateLimitStatus, Denial> {
        let outcome = if identity.is_unknown() {
            Err(RateLimitError::UnattributableIdentity)
        } else {
            let key = CounterKey::new(identity.kind(), identity.key_value(), config.resource_class);
            self.check_and_increment(&key, config).await
        };

        let now = self.clock.now_ms();
        match outcome {
            Ok(status) if status.allowed => Ok(status),
            Ok(status) => {
                self.recorder
                    .record(
                        SecurityEvent::new(
                            SecurityEventKind::RateLimitExceeded,
                            config.resource_class.as_str(),
                            "check",
                        )
                        .with_identity(identity)
                        .with_metadata("reason", "quota_exhausted")
                        .with_metadata("limit", config.max_requests)
                        .with_metadata("total_requests", status.total_requests),
                    )
                    .await;
                Err(Denial::RateLimitExceeded {
                    reset_at: status.reset_at(),
                    retry_after: status.retry_after(now),
                })
            }
            Err(err) => {
                if matches!(err, RateLimitError::Store(_)) {
                    error!(identity = %identity, error = %err, "Rate limit check failed, denying");
                }
                let closed = RateLimitStatus {
                    allowed: false,
                    remaining: 0,
                    reset_at_ms: now + config.window_duration_ms,
                    total_requests: 0,
                };
                self.recorder
                    .record(
                        SecurityEvent::new(
                            SecurityEventKind::RateLimitExceeded,
                            config.resource_class.as_str(),
                            "check",
                        )
                        .with_identity(identity)
                        .with_metadata("reason", err.reason()),
                    )
                    .await;
                Err(Denial::RateLimitExceeded {
                    reset_at: closed.reset_at(),
                    retry_after: closed.retry_after(now),
                })
            }
        }
    }

    /// Supersede the counter for `key` with an empty window (administrative
    /// unblock).
    pub async fn reset(&self, key: &CounterKey, actor: &Identity) -> Result<(), CollaboratorError> {
        let now = self.clock.now_ms();
        self.store
            .upsert(
                key,
                RateLimitCounter {
                    request_count: 0,
                    window_start_ms: now,
                    last_request_ms: now,
                },
            )
            .await?;

        self.recorder
            .record(
                SecurityEvent::new(
                    SecurityEventKind::AdminAction,
                    key.resource_class.as_str(),
                    "reset_quota",
                )
                .with_identity(actor)
                .with_metadata("key", key.to_string())
                .succeeded(),
            )
            .await;
        Ok(())
    }
}
