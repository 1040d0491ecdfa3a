//! The isolated worker thread and the reply pump feeding results back.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use kura_core::{Capability, ExtensionCall};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn};

use crate::backend::BackendFactory;
use crate::error::{BridgeError, BridgeResult};
use crate::pending::PendingCalls;

/// A call sent to the worker.
#[derive(Debug)]
pub(crate) struct WorkerRequest {
    pub(crate) id: u64,
    pub(crate) seq: u64,
    pub(crate) call: ExtensionCall,
}

/// The worker's answer to one [`WorkerRequest`].
#[derive(Debug)]
pub(crate) struct WorkerReply {
    pub(crate) id: u64,
    pub(crate) result: BridgeResult<Value>,
}

/// Start the worker thread.
///
/// The backend is built on the new thread; `ready` receives its capabilities
/// or the build error. The thread handles one request at a time and exits
/// when the request channel closes, dropping the backend with it.
pub(crate) fn spawn(
    label: &str,
    stack_size: Option<usize>,
    factory: BackendFactory,
    requests: mpsc::UnboundedReceiver<WorkerRequest>,
    replies: mpsc::UnboundedSender<WorkerReply>,
    ready: oneshot::Sender<BridgeResult<Vec<Capability>>>,
) -> BridgeResult<()> {
    let mut builder = thread::Builder::new().name(format!("kura-ext-{label}"));
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }

    let extension = label.to_owned();
    builder
        .spawn(move || run(&extension, factory, requests, replies, ready))
        .map(drop)
        .map_err(|e| BridgeError::Worker(format!("failed to spawn worker thread: {e}")))
}

fn run(
    extension: &str,
    factory: BackendFactory,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    replies: mpsc::UnboundedSender<WorkerReply>,
    ready: oneshot::Sender<BridgeResult<Vec<Capability>>>,
) {
    let mut backend = match factory() {
        Ok(backend) => backend,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        },
    };
    if ready.send(Ok(backend.capabilities())).is_err() {
        return;
    }

    while let Some(request) = requests.blocking_recv() {
        let span = info_span!(
            "extension_call",
            extension,
            call_id = request.id,
            seq = request.seq,
            capability = %request.call.capability(),
        );
        let _guard = span.enter();

        let result = backend.invoke(&request.call);
        if let Err(e) = &result {
            debug!(error = %e, kind = %e.kind(), "extension call failed");
        }

        if replies
            .send(WorkerReply {
                id: request.id,
                result,
            })
            .is_err()
        {
            break;
        }
    }

    debug!(extension, "extension worker exiting");
}

/// Resolve pending calls as replies arrive.
///
/// If the worker goes away, every call still pending is rejected so no reply
/// waits forever.
pub(crate) fn spawn_pump(
    extension: String,
    pending: Arc<Mutex<PendingCalls>>,
    mut replies: mpsc::UnboundedReceiver<WorkerReply>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            // Delivered under the table lock, so a call drained by dispose is
            // never resolved after dispose returns.
            let mut table = pending.lock().unwrap_or_else(PoisonError::into_inner);

            match table.take(reply.id) {
                Some(call) => {
                    debug!(
                        extension = %extension,
                        call_id = call.id,
                        capability = %call.capability,
                        elapsed_ms = u64::try_from(call.dispatched_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "extension call completed"
                    );
                    call.complete(reply.result);
                },
                None => {
                    debug!(extension = %extension, call_id = reply.id, "dropping reply for a call no longer pending");
                },
            }
        }

        let orphans = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain_in_order();
        if !orphans.is_empty() {
            warn!(extension = %extension, count = orphans.len(), "extension worker stopped with calls pending");
        }
        for call in orphans {
            call.reject(BridgeError::Worker("extension worker stopped".to_owned()));
        }
    })
}
