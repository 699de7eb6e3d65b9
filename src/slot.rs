// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Lazily initialized shared handle with invalidation.
//!
//! Collaborators such as a counter store connection are created on first use
//! and shared afterwards. When an operation through the handle fails, the
//! handle is dropped so the next caller builds a fresh one instead of reusing
//! a broken connection.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub struct HandleSlot<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Default for HandleSlot<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> HandleSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current handle, creating it with `init` if absent.
    ///
    /// Concurrent callers wait on the same initialization; a failed `init`
    /// leaves the slot empty.
    pub async fn get_or_init<F, Fut, E>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }
        let handle = Arc::new(init().await?);
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Run `op` through the handle, dropping the handle if `op` fails.
    pub async fn run<I, IFut, F, Fut, R, E>(&self, init: I, op: F) -> Result<R, E>
    where
        I: FnOnce() -> IFut,
        IFut: Future<Output = Result<T, E>>,
        F: FnOnce(Arc<T>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let handle = self.get_or_init(init).await?;
        match op(handle.clone()).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.invalidate_if_current(&handle).await;
                Err(err)
            }
        }
    }

    /// Drop the handle unconditionally.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    pub async fn is_initialized(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    // Another caller may already have replaced a failed handle.
    async fn invalidate_if_current(&self, failed: &Arc<T>) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, failed)) {
            debug!("Dropping failed handle");
            *slot = None;
        }
    }
}
