// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Timeouts and cancellation for collaborator calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::debug;

use crate::error::ServiceError;

/// Cancels every collaborator call that is in flight when
/// [`Canceller::cancel`] runs. Calls started afterwards are unaffected.
///
/// Cheap to clone; clones share one signal.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

impl Canceller {
    /// A fresh signal with nothing in flight.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel everything currently in flight.
    pub fn cancel(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Number of cancellations so far.
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// Run `call` under `limit`, giving up early if `canceller` fires.
pub(crate) async fn guarded<T, F>(
    op: &'static str,
    limit: Duration,
    canceller: &Canceller,
    call: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    let mut cancelled = canceller.subscribe();
    tokio::select! {
        res = time::timeout(limit, call) => res.unwrap_or_else(|_| {
            debug!(op, ?limit, "collaborator call timed out");
            Err(ServiceError::Timeout { op, after: limit })
        }),
        _ = cancelled.changed() => {
            debug!(op, "collaborator call cancelled");
            Err(ServiceError::Cancelled(op))
        }
    }
}
