//! Bounded polling watcher for a single status condition.
//!
//! The watcher re-reads one object on a fixed interval until the requested
//! condition reports `True`, the attempt budget runs out, or the caller
//! cancels. Timeouts are an outcome, not an error: only transport failures
//! and cancellation abort the wait.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::api::ApiResource;
use metrics::{counter, histogram};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use stackup_core::conditions::ConditionSet;
use stackup_core::version::WaitOutcome;
use stackup_core::{Error, Result};
use stackup_store::ObjectStore;

use crate::{ProgressSink, WaitDefaults};

/// One wait: which object, which condition, and the polling knobs.
///
/// Non-positive `timeout_secs` or `poll_interval_secs` fall back to the
/// watcher's [`WaitDefaults`]. The attempt budget is `timeout / interval`,
/// truncated; a timeout smaller than the interval yields zero attempts and
/// the wait reports a timeout without fetching at all.
#[derive(Debug, Clone)]
pub struct WaitRequest {
    pub namespace: String,
    pub name: String,
    pub condition: String,
    pub timeout_secs: i64,
    pub poll_interval_secs: i64,
}

/// Sender side of a wait cancellation.
///
/// Dropping the handle cancels too: the receiver resolves as soon as the
/// sender goes away, so an abandoned wait does not run to its timeout.
pub struct CancelHandle {
    tx: oneshot::Sender<()>,
}

impl CancelHandle {
    pub fn cancel(self) {
        let _ = self.tx.send(());
    }
}

/// Receiver side of a wait cancellation, consumed by [`ConditionWatcher::wait`].
pub struct CancelSignal {
    rx: Option<oneshot::Receiver<()>>,
}

impl CancelSignal {
    /// A signal that never fires, for call sites without a cancel path.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Sleep for `interval`, returning `false` if cancelled first.
    async fn sleep(&mut self, interval: Duration) -> bool {
        match self.rx.as_mut() {
            None => {
                tokio::time::sleep(interval).await;
                true
            }
            Some(rx) => {
                tokio::select! {
                    _ = rx => false,
                    _ = tokio::time::sleep(interval) => true,
                }
            }
        }
    }
}

pub fn cancel_channel() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = oneshot::channel();
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}

/// A spawned wait: join `task` for the outcome, or `cancel` it early.
pub struct WaitHandle {
    pub task: JoinHandle<Result<WaitOutcome>>,
    pub cancel: CancelHandle,
}

/// Polls one resource kind for a condition until it turns `True`.
#[derive(Clone)]
pub struct ConditionWatcher {
    store: Arc<dyn ObjectStore>,
    resource: ApiResource,
    sink: Arc<dyn ProgressSink>,
    defaults: WaitDefaults,
}

impl ConditionWatcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        resource: ApiResource,
        sink: Arc<dyn ProgressSink>,
        defaults: WaitDefaults,
    ) -> Self {
        Self { store, resource, sink, defaults }
    }

    /// Run the wait to completion.
    ///
    /// Returns `Ok` with `met = true` when the condition turned `True`, and
    /// `Ok` with `met = false` plus a `Timeout` reason when the budget ran
    /// out. Fetch errors and cancellation return `Err`. Attempts where the
    /// condition is absent from the object poll on silently.
    pub async fn wait(&self, req: &WaitRequest, mut cancel: CancelSignal) -> Result<WaitOutcome> {
        let timeout = if req.timeout_secs > 0 {
            req.timeout_secs
        } else {
            self.defaults.timeout_secs
        };
        let interval = if req.poll_interval_secs > 0 {
            req.poll_interval_secs
        } else {
            self.defaults.poll_interval_secs
        };
        if interval <= 0 {
            return Err(Error::Invalid(format!(
                "poll interval must be positive, got {interval}"
            )));
        }
        let max_attempts = timeout / interval;
        let started = Instant::now();

        self.sink.notify(&format!(
            "Waiting for condition '{}' on {} '{}/{}' (timeout: {}s)",
            req.condition, self.resource.kind, req.namespace, req.name, timeout
        ));
        info!(
            ns = %req.namespace,
            name = %req.name,
            condition = %req.condition,
            timeout_secs = timeout,
            interval_secs = interval,
            attempts = max_attempts,
            "waiting for condition"
        );

        let mut warned_duplicates = false;
        for attempt in 0..max_attempts {
            counter!("wait_polls_total", 1u64);
            let obj = self.store.get(&self.resource, &req.namespace, &req.name).await?;
            let set = ConditionSet::from_object(&obj.data);
            if !warned_duplicates && !set.duplicates().is_empty() {
                warn!(
                    ns = %req.namespace,
                    name = %req.name,
                    duplicates = ?set.duplicates(),
                    "duplicate condition types on object, first occurrence wins"
                );
                warned_duplicates = true;
            }
            if let Some(cond) = set.get(&req.condition) {
                if cond.status.is_true() {
                    info!(
                        ns = %req.namespace,
                        name = %req.name,
                        condition = %req.condition,
                        attempt,
                        "condition is True"
                    );
                    counter!("wait_met_total", 1u64);
                    histogram!("wait_ms", started.elapsed().as_secs_f64() * 1000.0);
                    return Ok(WaitOutcome {
                        met: true,
                        message: cond.message.clone(),
                        reason: cond.reason.clone(),
                    });
                }
                self.sink.notify(&format!(
                    "Polling... Condition '{}' status: {} (reason: {})",
                    req.condition, cond.status, cond.reason
                ));
            }
            if attempt < max_attempts - 1 {
                if !cancel.sleep(Duration::from_secs(interval as u64)).await {
                    counter!("wait_cancelled_total", 1u64);
                    return Err(Error::Cancelled(format!(
                        "wait for condition '{}' on '{}/{}' cancelled",
                        req.condition, req.namespace, req.name
                    )));
                }
            }
        }

        counter!("wait_timeout_total", 1u64);
        histogram!("wait_ms", started.elapsed().as_secs_f64() * 1000.0);
        info!(
            ns = %req.namespace,
            name = %req.name,
            condition = %req.condition,
            attempts = max_attempts,
            "condition wait timed out"
        );
        Ok(WaitOutcome {
            met: false,
            message: format!("Timeout waiting for condition '{}'", req.condition),
            reason: "Timeout".to_string(),
        })
    }

    /// Spawn the wait on the runtime and hand back the task plus cancel side.
    pub fn start(&self, req: WaitRequest) -> WaitHandle {
        let (cancel, signal) = cancel_channel();
        let watcher = self.clone();
        let task = tokio::spawn(async move { watcher.wait(&req, signal).await });
        WaitHandle { task, cancel }
    }
}
