//! What a worker thread drives: the extension backend.

use std::sync::Arc;

use kura_core::{Capability, ExtensionCall};
use kura_host::{ExtensionHost, HostOptions};
use kura_transport::{RateLimiter, Transport};
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};

/// Synchronous call interface run on an extension's worker thread.
///
/// Implementations never leave the thread they were created on, so they need
/// not be `Send`.
pub trait ExtensionBackend {
    /// Run one call to completion and return its decoded envelope value.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] describing why the call failed.
    fn invoke(&mut self, call: &ExtensionCall) -> BridgeResult<Value>;

    /// The capabilities this backend can serve.
    fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL.to_vec()
    }
}

/// Builds a backend on the worker thread.
pub type BackendFactory = Box<dyn FnOnce() -> BridgeResult<Box<dyn ExtensionBackend>> + Send>;

/// Backend running a compiled module in an [`ExtensionHost`].
#[derive(Debug)]
pub struct ScriptBackend {
    host: ExtensionHost,
}

impl ScriptBackend {
    /// Create a host and load `code` into it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HostLoad`] if the engine cannot be created or
    /// the module does not load.
    pub fn load(
        code: &str,
        options: HostOptions,
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
    ) -> BridgeResult<Self> {
        let mut host =
            ExtensionHost::new(options, transport, limiter).map_err(BridgeError::load_failure)?;
        host.load(code).map_err(BridgeError::load_failure)?;
        Ok(Self { host })
    }

    /// A factory that performs [`load`](Self::load) on the worker thread.
    #[must_use]
    pub fn factory(
        code: String,
        options: HostOptions,
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
    ) -> BackendFactory {
        Box::new(move || {
            let backend = Self::load(&code, options, transport, limiter)?;
            Ok(Box::new(backend) as Box<dyn ExtensionBackend>)
        })
    }
}

impl ExtensionBackend for ScriptBackend {
    fn invoke(&mut self, call: &ExtensionCall) -> BridgeResult<Value> {
        self.host.call(call).map_err(BridgeError::from)
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.host
            .surface()
            .map(|surface| surface.capabilities().to_vec())
            .unwrap_or_default()
    }
}
