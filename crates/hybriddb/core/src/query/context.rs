// HybridDB
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Per-request cancellation and deadline handle.
//!
//! A `QueryContext` is cloned into every engine call made on behalf of a
//! request. Only the engine call itself observes it: once an engine has
//! answered, cache and monitor bookkeeping runs to completion regardless of
//! the context's state.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a guarded engine call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled(String),
    DeadlineExceeded,
}

#[derive(Debug)]
struct ContextInner {
    cancelled: watch::Sender<bool>,
    reason: Mutex<Option<String>>,
}

/// Cancellation signal with optional deadline enforcement
#[derive(Debug, Clone)]
pub struct QueryContext {
    inner: Arc<ContextInner>,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                cancelled,
                reason: Mutex::new(None),
            }),
            deadline: None,
        }
    }

    /// A fresh context whose engine calls must finish within `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().child_with_timeout(timeout)
    }

    /// Shares this context's cancellation signal but tightens the deadline.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            inner: Arc::clone(&self.inner),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel every call running under this context (and its children).
    pub fn cancel(&self, reason: Option<&str>) {
        if let Some(reason) = reason {
            *self.inner.reason.lock() = Some(reason.to_string());
        }
        self.inner.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.borrow() || self.deadline_passed()
    }

    pub fn cancellation_reason(&self) -> Option<String> {
        if *self.inner.cancelled.borrow() {
            return Some(self.inner.reason.lock().clone().unwrap_or_else(|| "cancelled".to_string()));
        }
        if self.deadline_passed() { Some("deadline exceeded".to_string()) } else { None }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.inner.cancelled.subscribe();
        // The sender lives as long as `self`, so `wait_for` can only return Ok.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `future` unless the context is cancelled or its deadline passes first.
    pub async fn guard<F, T>(&self, future: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        if *self.inner.cancelled.borrow() {
            return Err(Interrupted::Cancelled(self.cancellation_reason().unwrap_or_default()));
        }
        if self.deadline_passed() {
            return Err(Interrupted::DeadlineExceeded);
        }

        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        // An answer that is already available wins over a concurrent cancellation.
        tokio::select! {
            biased;
            output = future => Ok(output),
            _ = self.cancelled() => Err(Interrupted::Cancelled(self.cancellation_reason().unwrap_or_default())),
            _ = expiry => Err(Interrupted::DeadlineExceeded),
        }
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_context_runs_future() {
        let ctx = QueryContext::background();
        let value = ctx.guard(async { 42 }).await;
        assert_eq!(value, Ok(42));
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let ctx = QueryContext::background();
        let canceller = ctx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel(Some("client went away"));
        });

        let outcome = ctx.guard(std::future::pending::<()>()).await;
        assert_eq!(outcome, Err(Interrupted::Cancelled("client went away".to_string())));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_future() {
        let ctx = QueryContext::with_timeout(Duration::from_millis(20));
        let outcome = ctx.guard(tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(outcome, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_already_cancelled_context_skips_future() {
        let ctx = QueryContext::background();
        ctx.cancel(None);
        let outcome = ctx.guard(async { 1 }).await;
        assert_eq!(outcome, Err(Interrupted::Cancelled("cancelled".to_string())));
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let parent = QueryContext::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
