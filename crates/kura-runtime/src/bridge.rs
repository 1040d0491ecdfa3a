//! Entry point: loading extensions onto isolated workers.

use std::sync::{Arc, Mutex};

use kura_config::Config;
use kura_core::{Capability, ExtensionCall, Manifest, SourceInfo};
use kura_transport::{CurlTransport, Transport};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::backend::{BackendFactory, ScriptBackend};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::LoadedExtension;
use crate::pending::PendingCalls;
use crate::reply::decode_json;
use crate::worker;

/// Loads extensions, each onto its own worker thread.
///
/// All extensions loaded through one bridge share its transport; each gets
/// its own script engine and rate limiter state.
pub struct ExtensionBridge {
    config: BridgeConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ExtensionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionBridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExtensionBridge {
    /// Create a bridge using the `curl` transport described by `config`.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let transport = Arc::new(CurlTransport::new(config.curl.clone()));
        Self { config, transport }
    }

    /// Create a bridge from the layered configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(BridgeConfig::from_config(config))
    }

    /// Replace the transport every extension uses.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// The settings in use.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Load a compiled module.
    ///
    /// The module is evaluated on a fresh worker thread in its own script
    /// namespace, then asked for its sources.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HostLoad`] if the module cannot be evaluated,
    /// lacks a unique export surface, or its source list cannot be obtained.
    pub async fn load_extension(
        &self,
        manifest: Manifest,
        code: impl Into<String>,
    ) -> BridgeResult<LoadedExtension> {
        let factory = ScriptBackend::factory(
            code.into(),
            self.config.host,
            Arc::clone(&self.transport),
            self.config.rate_limit.limiter(),
        );
        self.load_with_backend(manifest, factory).await
    }

    /// Load an extension served by any [`ExtensionBackend`](crate::ExtensionBackend).
    ///
    /// `factory` runs on the worker thread.
    ///
    /// # Errors
    ///
    /// As [`load_extension`](Self::load_extension).
    pub async fn load_with_backend(
        &self,
        manifest: Manifest,
        factory: BackendFactory,
    ) -> BridgeResult<LoadedExtension> {
        info!(extension = %manifest.pkg, version = %manifest.version, "loading extension");

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let pending = Arc::new(Mutex::new(PendingCalls::default()));

        let mut extension = LoadedExtension::new(manifest, request_tx, Arc::clone(&pending));
        let label = extension.manifest().pkg.clone();

        if let Err(e) = worker::spawn(
            &label,
            self.config.worker_stack_size,
            factory,
            request_rx,
            reply_tx,
            ready_tx,
        ) {
            extension.abandon();
            return Err(e);
        }
        extension.attach_pump(worker::spawn_pump(label.clone(), pending, reply_rx));

        let capabilities = match ready_rx.await {
            Ok(Ok(capabilities)) => capabilities,
            Ok(Err(e)) => return Err(fail_load(&extension, e)),
            Err(_) => {
                let e = BridgeError::Worker("worker exited before reporting readiness".to_owned());
                return Err(fail_load(&extension, e));
            },
        };
        if !capabilities.contains(&Capability::Manifest) {
            let e = BridgeError::load_failure("extension does not export getManifest");
            return Err(fail_load(&extension, e));
        }

        let sources: Vec<SourceInfo> = match extension
            .dispatch(ExtensionCall::Manifest, decode_json)
        {
            Ok(reply) => match reply.await {
                Ok(sources) => sources,
                Err(e) => return Err(fail_load(&extension, e)),
            },
            Err(e) => return Err(fail_load(&extension, e)),
        };

        extension.mark_ready(capabilities, sources);
        Ok(extension)
    }
}

fn fail_load(extension: &LoadedExtension, error: BridgeError) -> BridgeError {
    warn!(extension = %extension.manifest().pkg, error = %error, "extension failed to load");
    extension.abandon();
    match error {
        e @ BridgeError::HostLoad(_) => e,
        other => BridgeError::load_failure(other),
    }
}
