// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SurrealDB-backed counter store.
//!
//! Counters live in one table keyed by the [`CounterKey`] string, so every
//! instance pointed at the same server shares them. Compare-and-swap is a
//! single conditional `UPDATE`: the new values are written only when the
//! stored row still matches the expectation, and an empty result means the
//! swap was lost.

use crate::config::StoreConfig;
use crate::error::CollaboratorError;
use crate::store::{CounterKey, CounterStore, RateLimitCounter};
use async_trait::async_trait;
use surrealdb::{
    engine::any::{self, Any},
    opt::auth::Root,
    Surreal,
};
use tracing::{debug, info};

/// Table holding one row per counter key.
pub const COUNTER_TABLE: &str = "rate_limit_counters";

const SELECT_COUNTER: &str = "SELECT request_count, window_start_ms, last_request_ms \
     FROM type::thing($table, $id)";

const WRITE_COUNTER: &str = "UPDATE type::thing($table, $id) \
     SET request_count = $request_count, window_start_ms = $window_start_ms, \
     last_request_ms = $last_request_ms";

const CREATE_IF_ABSENT: &str = "UPDATE type::thing($table, $id) \
     SET request_count = $request_count, window_start_ms = $window_start_ms, \
     last_request_ms = $last_request_ms \
     WHERE request_count = NONE";

const SWAP_IF_UNCHANGED: &str = "UPDATE type::thing($table, $id) \
     SET request_count = $request_count, window_start_ms = $window_start_ms, \
     last_request_ms = $last_request_ms \
     WHERE request_count = $expected_count \
     AND window_start_ms = $expected_start \
     AND last_request_ms = $expected_last";

fn store_error(err: surrealdb::Error) -> CollaboratorError {
    CollaboratorError::CounterStore(err.to_string())
}

/// Counter store on a SurrealDB connection.
#[derive(Clone)]
pub struct SurrealCounterStore {
    db: Surreal<Any>,
}

impl SurrealCounterStore {
    /// Connect to the configured endpoint and prepare the counter table.
    pub async fn connect(config: &StoreConfig) -> Result<Self, CollaboratorError> {
        let db = any::connect(config.url.as_str()).await.map_err(store_error)?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await
            .map_err(store_error)?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(store_error)?;

        Self::init_schema(&db).await?;
        info!(
            namespace = %config.namespace,
            database = %config.database,
            "Counter store ready"
        );

        Ok(Self { db })
    }

    async fn init_schema(db: &Surreal<Any>) -> Result<(), CollaboratorError> {
        db.query(
            r#"
            DEFINE TABLE IF NOT EXISTS rate_limit_counters SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS request_count ON rate_limit_counters TYPE int;
            DEFINE FIELD IF NOT EXISTS window_start_ms ON rate_limit_counters TYPE int;
            DEFINE FIELD IF NOT EXISTS last_request_ms ON rate_limit_counters TYPE int;
        "#,
        )
        .await
        .map_err(store_error)?
        .check()
        .map_err(store_error)?;

        Ok(())
    }

    /// Run a counter write and report how many rows it touched.
    async fn write(
        &self,
        statement: &'static str,
        key: &CounterKey,
        counter: RateLimitCounter,
        expected: Option<RateLimitCounter>,
    ) -> Result<usize, CollaboratorError> {
        let mut query = self
            .db
            .query(statement)
            .bind(("table", COUNTER_TABLE))
            .bind(("id", key.to_string()))
            .bind(("request_count", counter.request_count))
            .bind(("window_start_ms", counter.window_start_ms))
            .bind(("last_request_ms", counter.last_request_ms));

        if let Some(expected) = expected {
            query = query
                .bind(("expected_count", expected.request_count))
                .bind(("expected_start", expected.window_start_ms))
                .bind(("expected_last", expected.last_request_ms));
        }

        let mut response = query.await.map_err(store_error)?;
        let rows: Vec<serde_json::Value> = response.take(0).map_err(store_error)?;
        Ok(rows.len())
    }
}

#[async_trait]
impl CounterStore for SurrealCounterStore {
    async fn get(
        &self,
        key: &CounterKey,
    ) -> Result<Option<RateLimitCounter>, CollaboratorError> {
        let mut response = self
            .db
            .query(SELECT_COUNTER)
            .bind(("table", COUNTER_TABLE))
            .bind(("id", key.to_string()))
            .await
            .map_err(store_error)?;

        let rows: Vec<RateLimitCounter> = response.take(0).map_err(store_error)?;
        Ok(rows.into_iter().next())
    }

    async fn upsert(
        &self,
        key: &CounterKey,
        counter: RateLimitCounter,
    ) -> Result<(), CollaboratorError> {
        self.write(WRITE_COUNTER, key, counter, None).await?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &CounterKey,
        expected: Option<RateLimitCounter>,
        new: RateLimitCounter,
    ) -> Result<bool, CollaboratorError> {
        let updated = match expected {
            None => self.write(CREATE_IF_ABSENT, key, new, None).await?,
            Some(expected) => self.write(SWAP_IF_UNCHANGED, key, new, Some(expected)).await?,
        };

        if updated == 0 {
            debug!(key = %key, "Counter changed since read");
        }
        Ok(updated > 0)
    }
}
