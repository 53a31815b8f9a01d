//! Single-flight execution: concurrent callers share one in-flight future.
//!
//! DESIGN
//! ======
//! The first caller (the leader) starts the operation and parks a
//! `Shared` handle in the slot; callers arriving while it is pending clone
//! that handle and await the same outcome. Whoever observes completion first
//! empties the slot, so the next call after settlement starts a new flight.
//! The slot lock is never held across an `.await`.
//!
//! Every flight carries a generation number, so observers can agree on a
//! once-per-flight side effect without depending on the leader surviving.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// Outcome of one [`SingleFlight::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flight<T> {
    pub value: T,
    /// `true` for the caller that started the operation.
    pub leader: bool,
    /// Identifies the flight; starts at 1 and grows with each new flight.
    pub generation: u64,
}

struct Pending<T: Clone> {
    generation: u64,
    future: Shared<BoxFuture<'static, T>>,
}

struct Slot<T: Clone> {
    started: u64,
    pending: Option<Pending<T>>,
}

pub struct SingleFlight<T: Clone> {
    slot: Mutex<Slot<T>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self { slot: Mutex::new(Slot { started: 0, pending: None }) }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .is_some()
    }

    /// Join the pending flight, or start one with `start` if none is pending.
    ///
    /// `start` is only invoked by the leader. The operation keeps running
    /// for the remaining callers if the leader is dropped.
    pub async fn run<F, Fut>(&self, start: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (future, generation, leader) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = slot.pending.as_ref() {
                (pending.future.clone(), pending.generation, false)
            } else {
                slot.started += 1;
                let generation = slot.started;
                let future = start().boxed().shared();
                slot.pending = Some(Pending { generation, future: future.clone() });
                (future, generation, true)
            }
        };

        let value = future.await;

        {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.pending.as_ref().is_some_and(|p| p.generation == generation) {
                slot.pending = None;
            }
        }

        Flight { value, leader, generation }
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "single_flight_test.rs"]
mod tests;
