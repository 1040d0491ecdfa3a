//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use kura_runtime::{BridgeConfig, ExtensionBridge, LoadedExtension};
use kura_test::{MockTransport, fixtures, sample_manifest};

/// A bridge over `transport` with rate limiting turned off.
pub fn unlimited_bridge(transport: &MockTransport) -> ExtensionBridge {
    let mut config = BridgeConfig::default();
    config.rate_limit.enabled = false;
    ExtensionBridge::new(config).with_transport(Arc::new(transport.clone()))
}

/// Load the sample module over `transport` with rate limiting turned off.
pub async fn load_sample(transport: &MockTransport) -> LoadedExtension {
    kura_test::init_test_logging();
    unlimited_bridge(transport)
        .load_extension(sample_manifest(), fixtures::SAMPLE_MODULE)
        .await
        .unwrap()
}
