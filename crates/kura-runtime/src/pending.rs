//! Table of calls dispatched to a worker and awaiting their reply.

use std::collections::HashMap;
use std::time::Instant;

use kura_core::{Capability, SourceId};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{BridgeError, BridgeResult};

/// Sender half resolving one reply.
pub(crate) type ReplySender = oneshot::Sender<BridgeResult<Value>>;

/// One outstanding call.
#[derive(Debug)]
pub(crate) struct PendingCall {
    pub(crate) id: u64,
    pub(crate) seq: u64,
    pub(crate) capability: Capability,
    pub(crate) source_id: Option<SourceId>,
    pub(crate) dispatched_at: Instant,
    tx: ReplySender,
}

impl PendingCall {
    /// Resolve the caller's reply. A caller that stopped waiting is ignored.
    pub(crate) fn complete(self, result: BridgeResult<Value>) {
        let _ = self.tx.send(result);
    }

    pub(crate) fn reject(self, error: BridgeError) {
        self.complete(Err(error));
    }
}

/// Correlation ids and sequence numbers for one extension.
#[derive(Debug, Default)]
pub(crate) struct PendingCalls {
    next_id: u64,
    next_seq: u64,
    calls: HashMap<u64, PendingCall>,
}

impl PendingCalls {
    /// Record a new call and return its id, sequence number and the
    /// receiver its reply arrives on.
    pub(crate) fn register(
        &mut self,
        capability: Capability,
        source_id: Option<SourceId>,
    ) -> (u64, u64, oneshot::Receiver<BridgeResult<Value>>) {
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let (tx, rx) = oneshot::channel();
        self.calls.insert(
            id,
            PendingCall {
                id,
                seq,
                capability,
                source_id,
                dispatched_at: Instant::now(),
                tx,
            },
        );
        (id, seq, rx)
    }

    /// Remove the call with `id`, if still pending.
    pub(crate) fn take(&mut self, id: u64) -> Option<PendingCall> {
        self.calls.remove(&id)
    }

    /// Remove every call, oldest dispatch first.
    pub(crate) fn drain_in_order(&mut self) -> Vec<PendingCall> {
        let mut calls: Vec<_> = self.calls.drain().map(|(_, call)| call).collect();
        calls.sort_by_key(|call| call.seq);
        calls
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}
