//! Per-query request supersession.
//!
//! Every logical query (one train, one station) has at most one live
//! request. Starting a new one aborts the previous task for the same
//! query, and a result may only be committed while its ticket is still
//! the current one.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;

use tokio::task::AbortHandle;
use tracing::debug;

use crate::domain::{Signature, TrainKey};

/// Logical query a request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Train(TrainKey),
    Station(Signature),
    Positions,
    Stations,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Train(key) => write!(f, "train:{key}"),
            QueryKey::Station(sig) => write!(f, "station:{sig}"),
            QueryKey::Positions => f.write_str("positions"),
            QueryKey::Stations => f.write_str("stations"),
        }
    }
}

/// The request was replaced by a newer one for the same query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request superseded by a newer one")]
pub struct Superseded;

/// Handle for one issued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    key: QueryKey,
    generation: u64,
}

impl Ticket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    task: Option<AbortHandle>,
}

/// Tracks the current request per [`QueryKey`].
#[derive(Debug, Default)]
pub struct RequestRegistry {
    slots: Mutex<HashMap<QueryKey, Slot>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Issue a new ticket for `key`, aborting any in-flight task for it.
    pub fn begin(&self, key: QueryKey) -> Ticket {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_default();
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            debug!(query = %key, "Aborting superseded request");
            task.abort();
        }
        Ticket {
            key,
            generation: slot.generation,
        }
    }

    /// Cancel whatever is in flight for `key`.
    pub fn cancel(&self, key: &QueryKey) {
        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(key) {
            slot.generation += 1;
            if let Some(task) = slot.task.take() {
                task.abort();
            }
        }
    }

    /// Returns true if no newer request for the ticket's query exists.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.slots()
            .get(&ticket.key)
            .is_some_and(|slot| slot.generation == ticket.generation)
    }

    /// `Ok` while the ticket is current.
    pub fn check(&self, ticket: &Ticket) -> Result<(), Superseded> {
        if self.is_current(ticket) {
            Ok(())
        } else {
            Err(Superseded)
        }
    }

    fn attach(&self, ticket: &Ticket, task: AbortHandle) {
        let mut slots = self.slots();
        match slots.get_mut(&ticket.key) {
            Some(slot) if slot.generation == ticket.generation => slot.task = Some(task),
            _ => task.abort(),
        }
    }

    fn detach(&self, ticket: &Ticket) {
        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(&ticket.key) {
            if slot.generation == ticket.generation {
                slot.task = None;
            }
        }
    }

    /// Run `fut` as an abortable task under `ticket`.
    ///
    /// Returns [`Superseded`] if the task was aborted or a newer ticket
    /// was issued while it ran.
    pub async fn run<T, F>(&self, ticket: &Ticket, fut: F) -> Result<T, Superseded>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.attach(ticket, handle.abort_handle());

        let result = handle.await;
        self.detach(ticket);

        match result {
            Ok(value) => {
                self.check(ticket)?;
                Ok(value)
            }
            Err(e) if e.is_cancelled() => Err(Superseded),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}
