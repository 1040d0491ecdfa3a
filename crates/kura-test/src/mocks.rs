//! Mock implementations for testing.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kura_core::{Capability, ExtensionCall, ExtensionFailure};
use kura_runtime::{BackendFactory, BridgeError, BridgeResult, ExtensionBackend};
use kura_transport::wire::reason_phrase;
use kura_transport::{Transport, TransportError, TransportResult, WireBody, WireRequest, WireResponse};
use serde_json::{Value, json};

/// Mock implementation of [`Transport`] serving queued responses.
///
/// Clones share the queue and the request log, so a test can keep a clone
/// to inspect what was sent after handing the original to a host.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    /// Queued outcomes, served in order.
    responses: Arc<Mutex<VecDeque<TransportResult<WireResponse>>>>,
    /// Every request executed.
    requests: Arc<Mutex<Vec<WireRequest>>>,
}

impl MockTransport {
    /// Create a mock with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a complete response.
    #[must_use]
    pub fn with_response(self, response: WireResponse) -> Self {
        if let Ok(mut guard) = self.responses.lock() {
            guard.push_back(Ok(response));
        }
        self
    }

    /// Queue a text response.
    ///
    /// Error statuses carry the same `error` note the `curl` transport adds.
    #[must_use]
    pub fn with_text(self, status: u16, body: &str) -> Self {
        self.with_response(response(status, WireBody::Text(body.to_owned())))
    }

    /// Queue a binary response, delivered base64-encoded.
    #[must_use]
    pub fn with_bytes(self, status: u16, body: &[u8]) -> Self {
        self.with_response(response(status, WireBody::Base64(STANDARD.encode(body))))
    }

    /// Queue a failure to obtain any response.
    #[must_use]
    pub fn with_failure(self, message: &str) -> Self {
        if let Ok(mut guard) = self.responses.lock() {
            guard.push_back(Err(TransportError::Io(std::io::Error::other(
                message.to_owned(),
            ))));
        }
        self
    }

    /// Requests executed so far.
    #[must_use]
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Responses still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

fn response(status: u16, body: WireBody) -> WireResponse {
    let error = (status >= 400).then(|| {
        format!("HTTP {status} {}", reason_phrase(status))
            .trim_end()
            .to_owned()
    });
    WireResponse {
        status,
        headers: BTreeMap::new(),
        body,
        error,
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &WireRequest) -> TransportResult<WireResponse> {
        tracing::debug!(url = %request.url, method = %request.method, "mock transport request");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::NoOutput {
                    exit_code: None,
                    stderr: format!("no mock response queued for {}", request.url),
                })
            })
    }
}

/// Scripted outcome of one capability.
#[derive(Debug, Clone)]
enum Scripted {
    Value(Value),
    Failure(String),
    Panic,
}

/// A scriptable [`ExtensionBackend`] for exercising the runtime without a
/// script engine.
///
/// Every capability answers with a valid empty value unless scripted
/// otherwise. Calls are logged in the order the worker ran them.
#[derive(Debug, Clone, Default)]
pub struct StubBackend {
    scripted: Arc<Mutex<HashMap<Capability, Scripted>>>,
    delays: Arc<Mutex<HashMap<Capability, Duration>>>,
    exported: Option<HashSet<Capability>>,
    calls: Arc<Mutex<Vec<ExtensionCall>>>,
    invocations: Arc<AtomicUsize>,
}

impl StubBackend {
    /// Create a backend exporting every capability.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `capability` with `value` (the envelope's `data`).
    #[must_use]
    pub fn with_response(self, capability: Capability, value: Value) -> Self {
        self.script(capability, Scripted::Value(value))
    }

    /// Answer `capability` with an extension failure.
    #[must_use]
    pub fn with_failure(self, capability: Capability, message: &str) -> Self {
        self.script(capability, Scripted::Failure(message.to_owned()))
    }

    /// Panic the worker thread when `capability` is called.
    #[must_use]
    pub fn with_panic(self, capability: Capability) -> Self {
        self.script(capability, Scripted::Panic)
    }

    /// Block the worker for `delay` before answering `capability`.
    #[must_use]
    pub fn with_delay(self, capability: Capability, delay: Duration) -> Self {
        if let Ok(mut guard) = self.delays.lock() {
            guard.insert(capability, delay);
        }
        self
    }

    /// Export only `capabilities`.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.exported = Some(capabilities.iter().copied().collect());
        self
    }

    /// Calls the worker has started, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ExtensionCall> {
        self.calls
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of calls the worker has started.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// A factory moving a clone of this backend onto the worker.
    #[must_use]
    pub fn factory(&self) -> BackendFactory {
        let backend = self.clone();
        Box::new(move || Ok(Box::new(backend) as Box<dyn ExtensionBackend>))
    }

    /// A factory that fails the way a module that does not load fails.
    #[must_use]
    pub fn failing_factory(message: &str) -> BackendFactory {
        let message = message.to_owned();
        Box::new(move || Err(BridgeError::HostLoad(message)))
    }

    fn script(self, capability: Capability, outcome: Scripted) -> Self {
        if let Ok(mut guard) = self.scripted.lock() {
            guard.insert(capability, outcome);
        }
        self
    }
}

impl ExtensionBackend for StubBackend {
    fn invoke(&mut self, call: &ExtensionCall) -> BridgeResult<Value> {
        let capability = call.capability();
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());

        let delay = self
            .delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability)
            .copied();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability)
            .cloned();
        match scripted {
            Some(Scripted::Value(value)) => Ok(value),
            Some(Scripted::Failure(message)) => {
                Err(BridgeError::Extension(ExtensionFailure::new(message)))
            },
            Some(Scripted::Panic) => panic!("stub backend told to panic on {capability}"),
            None => Ok(default_response(capability)),
        }
    }

    fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self.exported.as_ref().is_none_or(|set| set.contains(c)))
            .collect()
    }
}

/// A valid empty answer for `capability`.
fn default_response(capability: Capability) -> Value {
    match capability {
        Capability::Manifest => crate::fixtures::sample_sources(),
        Capability::PopularManga | Capability::LatestUpdates | Capability::SearchManga => {
            json!({"mangas": [], "hasNextPage": false})
        },
        Capability::MangaDetails => json!({"url": "/manga/1", "title": "Stub"}),
        Capability::ChapterList | Capability::PageList | Capability::FilterList => json!([]),
        Capability::FetchImage => json!(""),
        Capability::Headers => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use kura_core::SourceId;

    use super::*;

    #[test]
    fn test_mock_transport_serves_in_order() {
        let transport = MockTransport::new()
            .with_text(200, "a")
            .with_text(404, "missing");
        let request = WireRequest::get("https://example.org");

        let first = transport.execute(&request).unwrap();
        assert_eq!(first.body.as_str(), "a");
        assert!(first.error.is_none());

        let second = transport.execute(&request).unwrap();
        assert_eq!(second.error.as_deref(), Some("HTTP 404 Not Found"));

        assert!(transport.execute(&request).is_err());
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn test_mock_transport_bytes() {
        let transport = MockTransport::new().with_bytes(200, &[0xff, 0x00]);
        let response = transport.execute(&WireRequest::get("https://example.org")).unwrap();
        assert!(response.body.is_base64());
        assert_eq!(response.body.as_str(), "/wA=");
    }

    #[test]
    fn test_stub_backend_scripting() {
        let stub = StubBackend::new()
            .with_failure(Capability::Headers, "nope")
            .with_capabilities(&[Capability::Manifest, Capability::Headers]);
        let mut backend = stub.clone();

        let call = ExtensionCall::Headers {
            source_id: SourceId::new("1"),
        };
        assert!(matches!(
            backend.invoke(&call),
            Err(BridgeError::Extension(_))
        ));
        assert_eq!(backend.capabilities().len(), 2);
        assert_eq!(stub.call_count(), 1);
        assert_eq!(stub.calls(), vec![call]);
    }
}
