// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse patterns for security testing.

use community_guard::limiter::{RateLimitConfig, ResourceClass};

/// How callers are presented to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    /// Signed-in accounts.
    Account,
    /// Network addresses from proxy headers.
    Address,
    /// Requests with no attributable address at all.
    Unattributable,
}

/// Flood pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Requests sent per caller
    pub requests_per_caller: usize,
    /// Number of distinct callers
    pub unique_callers: usize,
    /// Caller presentation
    pub caller_kind: CallerKind,
    /// Requests in flight at once
    pub concurrency: usize,
    /// Quota class the requests fall under
    pub resource_class: ResourceClass,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            requests_per_caller: 20,
            unique_callers: 1,
            caller_kind: CallerKind::Account,
            concurrency: 1,
            resource_class: ResourceClass::ReviewSubmission,
        }
    }
}

/// Predefined flood patterns.
impl AttackConfig {
    /// One account firing many simultaneous submissions to overspend its quota.
    pub fn double_spend_flood() -> Self {
        Self {
            requests_per_caller: 100,
            concurrency: 100,
            ..Default::default()
        }
    }

    /// Sequential submissions from one account.
    pub fn single_account_flood() -> Self {
        Self {
            requests_per_caller: 50,
            resource_class: ResourceClass::CollectionCreation,
            ..Default::default()
        }
    }

    /// Many addresses, each staying a little over the anonymous report quota.
    pub fn distributed_reports() -> Self {
        Self {
            requests_per_caller: 5,
            unique_callers: 50,
            caller_kind: CallerKind::Address,
            concurrency: 25,
            resource_class: ResourceClass::ReportSubmissionAnonymous,
        }
    }

    /// Requests stripped of every address header.
    pub fn unattributable_flood() -> Self {
        Self {
            requests_per_caller: 30,
            caller_kind: CallerKind::Unattributable,
            concurrency: 10,
            resource_class: ResourceClass::ReportSubmissionAnonymous,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> RateLimitConfig {
        self.resource_class.config()
    }

    pub fn total_requests(&self) -> usize {
        self.requests_per_caller * self.unique_callers
    }
}

/// Expected outcomes for a flood pattern.
pub struct AttackExpectations {
    /// Exact number of requests that may be admitted
    pub allowed: usize,
    /// Description of expected behavior
    pub description: &'static str,
}

impl AttackConfig {
    /// Expected outcome within a single window.
    pub fn expectations(&self) -> AttackExpectations {
        let quota = self.policy().max_requests as usize;
        match self.caller_kind {
            CallerKind::Unattributable => AttackExpectations {
                allowed: 0,
                description: "Unattributable callers are never admitted",
            },
            _ => AttackExpectations {
                allowed: self.unique_callers * quota.min(self.requests_per_caller),
                description: "Each caller is capped at its quota, regardless of concurrency",
            },
        }
    }
}
