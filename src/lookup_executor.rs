//! lookup_executor.rs - Runs catalog lookups on a dedicated background thread.
//!
//! A UI thread sends `LookupRequest`s and keeps rendering while the catalog
//! is queried; results come back as `LookupResponse`s tagged with the request
//! id so the caller can tell which ones are still wanted (see `picker`).

use crate::catalog::{CatalogLookup, LookupError, Part};
use crate::slots::{SlotDefinition, SlotId};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Unique identifier for each request/response pair.
pub type RequestId = u64;

/// A request to fetch every part of a slot's category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub id: RequestId,
    pub slot: SlotId,
    pub category: String,
}

impl LookupRequest {
    pub fn for_slot(id: RequestId, slot: &SlotDefinition) -> Self {
        Self {
            id,
            slot: slot.id.clone(),
            category: slot.category.clone(),
        }
    }

    /// A request not tied to a picker; the category doubles as the slot id.
    pub fn for_category(id: RequestId, category: &str) -> Self {
        Self {
            id,
            slot: SlotId::new(category),
            category: category.to_string(),
        }
    }
}

/// The raw catalog result for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResponse {
    pub id: RequestId,
    pub slot: SlotId,
    pub result: Result<Vec<Part>, LookupError>,
}

/// Spawns a dedicated thread that serves lookup requests.
///
/// The thread handles requests one at a time, in arrival order, and exits
/// when the request channel closes or nobody is listening for responses.
pub fn spawn_lookup_thread<L>(
    lookup: L,
    request_rx: Receiver<LookupRequest>,
    response_tx: Sender<LookupResponse>,
) -> JoinHandle<()>
where
    L: CatalogLookup + Send + 'static,
{
    std::thread::spawn(move || {
        tracing::debug!("Lookup executor thread started.");
        while let Ok(request) = request_rx.recv() {
            tracing::debug!("Executing lookup request: {:?}", request);
            let result = lookup.query(&request.category);
            if let Err(e) = &result {
                tracing::warn!("Lookup {} for '{}' failed: {}", request.id, request.category, e);
            }

            let response = LookupResponse {
                id: request.id,
                slot: request.slot,
                result,
            };
            if response_tx.send(response).is_err() {
                tracing::debug!("Response receiver dropped, stopping lookup executor.");
                break;
            }
        }
        tracing::debug!("Lookup executor thread finished.");
    })
}

/// Owns both channel ends of a running lookup thread.
#[derive(Debug)]
pub struct LookupWorker {
    request_tx: Sender<LookupRequest>,
    response_rx: Receiver<LookupResponse>,
    handle: Option<JoinHandle<()>>,
}

impl LookupWorker {
    pub fn spawn<L>(lookup: L) -> Self
    where
        L: CatalogLookup + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();
        let handle = spawn_lookup_thread(lookup, request_rx, response_tx);
        Self {
            request_tx,
            response_rx,
            handle: Some(handle),
        }
    }

    /// Queue a request. Returns false if the worker thread has stopped.
    pub fn submit(&self, request: LookupRequest) -> bool {
        self.request_tx.send(request).is_ok()
    }

    /// Next response if one is ready, without blocking.
    pub fn try_recv(&self) -> Option<LookupResponse> {
        match self.response_rx.try_recv() {
            Ok(response) => Some(response),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next response.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LookupResponse> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Close the request channel and wait for the thread to drain.
    pub fn shutdown(mut self) {
        let handle = self.handle.take();
        drop(self);
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Lookup executor thread panicked");
            }
        }
    }
}
