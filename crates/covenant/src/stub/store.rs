//! Expectation storage.
//!
//! Transient expectations are grouped into one FIFO queue per request
//! shape. The queue of the most recently registered shape is tried first,
//! and within a queue the oldest entry is served first. Matching and
//! removal happen under one lock, so concurrent requests never consume the
//! same transient expectation.
//!
//! Persistent expectations are never consumed; the most recently
//! registered match wins.

use super::HttpStubData;
use crate::http::HttpRequest;
use crate::result::{Failures, MatchResult};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Default)]
pub struct ExpectationStore {
    /// Newest shape first
    transient: Mutex<Vec<VecDeque<HttpStubData>>>,
    /// Registration order
    persistent: RwLock<Vec<HttpStubData>>,
}

impl ExpectationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transient(&self, stub: HttpStubData) {
        let mut queues = self.transient.lock();
        let existing = queues
            .iter()
            .position(|queue| queue.front().is_some_and(|s| s.same_shape(&stub)));
        let mut queue = match existing {
            Some(index) => queues.remove(index),
            None => VecDeque::new(),
        };
        queue.push_back(stub);
        debug!(queued = queue.len(), "added transient expectation");
        queues.insert(0, queue);
    }

    pub fn add_persistent(&self, stub: HttpStubData) {
        self.persistent.write().push(stub);
    }

    /// Remove and return the transient expectation that answers `request`.
    /// On a miss, returns why each queue head did not match.
    pub fn take_transient(&self, request: &HttpRequest) -> Result<HttpStubData, Vec<Failures>> {
        let mut queues = self.transient.lock();
        let mut misses = Vec::new();
        let found = queues.iter().position(|queue| {
            let Some(stub) = queue.front() else {
                return false;
            };
            match stub.matches(request) {
                MatchResult::Success => true,
                MatchResult::Failure(failures) => {
                    misses.push(failures);
                    false
                }
            }
        });
        let Some(index) = found else {
            return Err(misses);
        };
        let stub = queues[index].pop_front();
        if queues[index].is_empty() {
            queues.remove(index);
        }
        stub.ok_or(misses)
    }

    /// The most recently registered persistent expectation for `request`
    pub fn find_persistent(&self, request: &HttpRequest) -> Result<HttpStubData, Vec<Failures>> {
        let persistent = self.persistent.read();
        let mut misses = Vec::new();
        for stub in persistent.iter().rev() {
            match stub.matches(request) {
                MatchResult::Success => return Ok(stub.clone()),
                MatchResult::Failure(failures) => misses.push(failures),
            }
        }
        Err(misses)
    }

    /// Drop a transient expectation by id. Returns whether one was removed.
    pub fn remove_transient(&self, stub_id: &str) -> bool {
        let mut queues = self.transient.lock();
        let before: usize = queues.iter().map(VecDeque::len).sum();
        for queue in queues.iter_mut() {
            queue.retain(|s| s.stub_id.as_deref() != Some(stub_id));
        }
        queues.retain(|q| !q.is_empty());
        let after: usize = queues.iter().map(VecDeque::len).sum();
        before != after
    }

    pub fn transient_count(&self) -> usize {
        self.transient.lock().iter().map(VecDeque::len).sum()
    }

    pub fn persistent_count(&self) -> usize {
        self.persistent.read().len()
    }

    pub fn clear(&self) {
        self.transient.lock().clear();
        self.persistent.write().clear();
    }
}
