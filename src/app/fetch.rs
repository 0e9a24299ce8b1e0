use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::error::StoreError;
use crate::records::{Category, Record};
use crate::search::RecordQuery;
use crate::storage::RecordStore;

#[derive(Debug)]
struct FetchRequest {
    generation: u64,
    category: Category,
    query: RecordQuery,
}

#[derive(Debug)]
pub struct FetchResponse {
    pub generation: u64,
    pub category: Category,
    pub result: Result<Vec<Record>, StoreError>,
}

/// Runs record listings off the UI thread. Each request carries a generation
/// number; callers keep only the response for the generation they await.
pub struct FetchWorker {
    requests: Option<Sender<FetchRequest>>,
    responses: Receiver<FetchResponse>,
    next_generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl FetchWorker {
    pub fn spawn(store: Arc<dyn RecordStore>) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<FetchRequest>();
        let (response_tx, response_rx) = unbounded::<FetchResponse>();
        let handle = thread::Builder::new()
            .name("frontdesk-fetch".into())
            .spawn(move || {
                for request in request_rx.iter() {
                    let result = store.list(request.category, &request.query);
                    if let Err(err) = &result {
                        tracing::warn!(
                            ?err,
                            generation = request.generation,
                            category = %request.category,
                            "record fetch failed"
                        );
                    }
                    let response = FetchResponse {
                        generation: request.generation,
                        category: request.category,
                        result,
                    };
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
            })
            .context("spawning fetch worker thread")?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            next_generation: 0,
            handle: Some(handle),
        })
    }

    /// Queues a listing and returns its generation.
    pub fn submit(&mut self, category: Category, query: RecordQuery) -> Result<u64, StoreError> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let sender = self
            .requests
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("fetch worker stopped".into()))?;
        sender
            .send(FetchRequest {
                generation,
                category,
                query,
            })
            .map_err(|_| StoreError::Unavailable("fetch worker stopped".into()))?;
        tracing::debug!(generation, category = %category, "record fetch queued");
        Ok(generation)
    }

    /// Returns the next finished listing, if any. Fails once the worker
    /// thread has exited and no responses remain.
    pub fn try_recv(&self) -> Result<Option<FetchResponse>, StoreError> {
        match self.responses.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(StoreError::Unavailable("fetch worker stopped".into()))
            }
        }
    }
}

impl Drop for FetchWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("fetch worker panicked");
            }
        }
    }
}
