// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Counter-store collaborator contract.
//!
//! The rate limiter holds no counters itself. Every read and write goes
//! through a [`CounterStore`], whose `compare_and_swap` is the only
//! primitive the limiter relies on for per-key atomicity. Backends shared by
//! several instances implement it with a conditional update.

use crate::error::CollaboratorError;
use crate::identity::IdentityKind;
use crate::limiter::ResourceClass;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;

/// Counter key. The identity value is used verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub identity_kind: IdentityKind,
    pub identity_value: String,
    pub resource_class: ResourceClass,
}

impl CounterKey {
    pub fn new(
        identity_kind: IdentityKind,
        identity_value: impl Into<String>,
        resource_class: ResourceClass,
    ) -> Self {
        Self {
            identity_kind,
            identity_value: identity_value.into(),
            resource_class,
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.identity_kind.as_str(),
            self.identity_value,
            self.resource_class.as_str()
        )
    }
}

/// Stored window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub request_count: u32,
    pub window_start_ms: i64,
    pub last_request_ms: i64,
}

impl RateLimitCounter {
    /// Counter for the first request of a new window.
    pub fn opened_at(now_ms: i64) -> Self {
        Self {
            request_count: 1,
            window_start_ms: now_ms,
            last_request_ms: now_ms,
        }
    }
}

/// Durable counter storage.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(
        &self,
        key: &CounterKey,
    ) -> Result<Option<RateLimitCounter>, CollaboratorError>;

    /// Unconditional write.
    async fn upsert(
        &self,
        key: &CounterKey,
        counter: RateLimitCounter,
    ) -> Result<(), CollaboratorError>;

    /// Atomically replace the stored counter with `new` if it still equals
    /// `expected` (`None` meaning "absent"). Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key: &CounterKey,
        expected: Option<RateLimitCounter>,
        new: RateLimitCounter,
    ) -> Result<bool, CollaboratorError>;
}

/// Counter store backed by process memory.
///
/// Not shared between instances, so the service binary refuses it; tests and
/// embedders that run a single instance use it directly.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<CounterKey, RateLimitCounter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.counters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.counters.lock().await.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(
        &self,
        key: &CounterKey,
    ) -> Result<Option<RateLimitCounter>, CollaboratorError> {
        Ok(self.counters.lock().await.get(key).copied())
    }

    async fn upsert(
        &self,
        key: &CounterKey,
        counter: RateLimitCounter,
    ) -> Result<(), CollaboratorError> {
        self.counters.lock().await.insert(key.clone(), counter);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &CounterKey,
        expected: Option<RateLimitCounter>,
        new: RateLimitCounter,
    ) -> Result<bool, CollaboratorError> {
        let mut counters = self.counters.lock().await;
        if counters.get(key).copied() != expected {
            return Ok(false);
        }
        counters.insert(key.clone(), new);
        Ok(true)
    }
}
