//! Request/response pairing
//!
//! Responses are matched to requests in FIFO order so a response section can
//! learn the method of the request it answers. Once a request is refused for
//! lack of room, later responses no longer line up with the queue: the queued
//! requests are still answered first, but anything after them is unpaired.

use std::collections::VecDeque;

use serde::Serialize;

use super::types::HttpMethod;

/// Maximum requests pipelined ahead of their responses
pub const PIPELINE_DEPTH: usize = 100;

/// One request and what has been seen of its response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpTransaction {
    pub id: u64,
    pub method: HttpMethod,
    /// 1xx responses seen before the final one
    pub interim_responses: u32,
}

/// FIFO of requests awaiting a final response
#[derive(Debug, Default)]
pub struct TransactionQueue {
    pending: VecDeque<HttpTransaction>,
    next_id: u64,
    retired: u64,
    overflowed: bool,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction for a new request
    ///
    /// Returns `None` when the request was refused, either because the
    /// pipeline is full or because an earlier request was already refused.
    pub fn open(&mut self, method: HttpMethod) -> Option<u64> {
        if self.overflowed || self.pending.len() >= PIPELINE_DEPTH {
            self.overflowed = true;
            return None;
        }

        self.next_id += 1;
        let id = self.next_id;
        self.pending.push_back(HttpTransaction {
            id,
            method,
            interim_responses: 0,
        });
        Some(id)
    }

    /// Transaction the next response belongs to
    pub fn awaiting_response(&self) -> Option<&HttpTransaction> {
        self.pending.front()
    }

    /// Record a response header; final responses retire the transaction
    pub fn record_response(&mut self, status_code: Option<u16>) -> Option<HttpTransaction> {
        let interim = matches!(status_code, Some(100..=199));
        if interim {
            if let Some(tx) = self.pending.front_mut() {
                tx.interim_responses += 1;
            }
            return None;
        }

        let retired = self.pending.pop_front();
        if retired.is_some() {
            self.retired += 1;
        }
        retired
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Has a request been refused on this flow
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Transactions completed so far
    pub fn retired(&self) -> u64 {
        self.retired
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.overflowed = false;
    }
}
