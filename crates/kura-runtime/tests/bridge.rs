//! Lifecycle, ordering and failure behaviour of loaded extensions, driven
//! through a scripted backend.

use std::time::Duration;

use futures::FutureExt;
use kura_core::{Capability, ExtensionCall, SourceId};
use kura_runtime::{BridgeConfig, BridgeError, ErrorKind, ExtensionBridge, ExtensionState, LoadedExtension};
use kura_test::{StubBackend, sample_manifest};
use serde_json::json;

async fn load(stub: &StubBackend) -> LoadedExtension {
    ExtensionBridge::new(BridgeConfig::default())
        .load_with_backend(sample_manifest(), stub.factory())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_load_reports_sources_and_capabilities() {
    let stub = StubBackend::new();
    let extension = load(&stub).await;

    assert_eq!(extension.state(), ExtensionState::Ready);
    assert_eq!(extension.capabilities(), Capability::ALL.as_slice());
    assert_eq!(extension.sources().len(), 2);
    assert!(extension.source(&SourceId::new("1002")).is_some());
    assert_eq!(stub.calls(), vec![ExtensionCall::Manifest]);
}

#[tokio::test]
async fn test_replies_arrive_in_dispatch_order() {
    let stub = StubBackend::new().with_delay(Capability::PopularManga, Duration::from_millis(100));
    let extension = load(&stub).await;

    let mut slow = extension.popular_manga("1001", 1).unwrap();
    let mut details = extension.manga_details("1001", "/manga/a").unwrap();
    let headers = extension.headers("1001").unwrap();
    assert_eq!(extension.pending_calls(), 3);

    headers.await.unwrap();
    // Everything dispatched earlier has already been answered.
    assert!(matches!((&mut slow).now_or_never(), Some(Ok(_))));
    assert!(matches!((&mut details).now_or_never(), Some(Ok(_))));

    let order: Vec<Capability> = stub.calls().iter().map(ExtensionCall::capability).collect();
    assert_eq!(
        order,
        vec![
            Capability::Manifest,
            Capability::PopularManga,
            Capability::MangaDetails,
            Capability::Headers,
        ]
    );
    assert_eq!(extension.pending_calls(), 0);
}

#[tokio::test]
async fn test_dispose_is_synchronous_and_idempotent() {
    let stub = StubBackend::new();
    let extension = load(&stub).await;

    extension.dispose();
    assert_eq!(extension.state(), ExtensionState::Disposed);
    extension.dispose();
    assert_eq!(extension.state(), ExtensionState::Disposed);

    let err = extension.popular_manga("1001", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Disposed);
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn test_dispose_cancels_pending_calls() {
    let stub = StubBackend::new().with_delay(Capability::PopularManga, Duration::from_millis(200));
    let extension = load(&stub).await;

    let in_flight = extension.popular_manga("1001", 1).unwrap();
    let queued = extension.latest_updates("1001", 1).unwrap();
    extension.dispose();

    assert_eq!(extension.pending_calls(), 0);
    assert!(matches!(in_flight.await, Err(BridgeError::Cancelled)));
    assert!(matches!(queued.await, Err(BridgeError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispose_settles_every_reply() {
    for _ in 0..50 {
        let stub = StubBackend::new();
        let extension = load(&stub).await;

        let reply = extension.headers("1001").unwrap();
        tokio::task::yield_now().await;
        extension.dispose();

        // Either answered before dispose or cancelled by it, never later.
        assert!(reply.now_or_never().is_some());
    }
}

#[tokio::test]
async fn test_dropping_handle_cancels_replies() {
    let stub = StubBackend::new().with_delay(Capability::Headers, Duration::from_millis(200));
    let extension = load(&stub).await;

    let reply = extension.headers("1001").unwrap();
    drop(extension);
    assert!(matches!(reply.await, Err(BridgeError::Cancelled)));
}

#[tokio::test]
async fn test_factory_failure_is_host_load() {
    let err = ExtensionBridge::new(BridgeConfig::default())
        .load_with_backend(sample_manifest(), StubBackend::failing_factory("bad bytecode"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HostLoad);
    assert!(err.to_string().contains("bad bytecode"));
}

#[tokio::test]
async fn test_missing_manifest_export_is_host_load() {
    let stub = StubBackend::new().with_capabilities(&[Capability::PopularManga]);
    let err = ExtensionBridge::new(BridgeConfig::default())
        .load_with_backend(sample_manifest(), stub.factory())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HostLoad);
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn test_failing_manifest_call_is_host_load() {
    let stub = StubBackend::new().with_failure(Capability::Manifest, "no sources today");
    let err = ExtensionBridge::new(BridgeConfig::default())
        .load_with_backend(sample_manifest(), stub.factory())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HostLoad);
    assert!(err.to_string().contains("no sources today"));
}

#[tokio::test]
async fn test_calls_are_checked_before_dispatch() {
    let stub = StubBackend::new().with_capabilities(&[
        Capability::Manifest,
        Capability::PopularManga,
        Capability::LatestUpdates,
    ]);
    let extension = load(&stub).await;

    let unknown = extension.popular_manga("9999", 1).unwrap_err();
    assert!(matches!(unknown, BridgeError::UnknownSource(ref id) if id.as_str() == "9999"));

    let missing = extension.search_manga("1001", 1, "x", None).unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Unsupported);

    let no_latest = extension.latest_updates("1002", 1).unwrap_err();
    assert_eq!(no_latest.kind(), ErrorKind::Unsupported);

    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn test_deadline_disposes_extension() {
    let stub = StubBackend::new().with_delay(Capability::MangaDetails, Duration::from_millis(500));
    let extension = load(&stub).await;

    let reply = extension.manga_details("1001", "/slow").unwrap();
    let err = extension
        .with_deadline(Duration::from_millis(50), reply)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Timeout(_)));
    assert_eq!(extension.state(), ExtensionState::Disposed);
}

#[tokio::test]
async fn test_deadline_passes_result_through() {
    let stub = StubBackend::new();
    let extension = load(&stub).await;

    let reply = extension.chapter_list("1001", "/manga/a").unwrap();
    let chapters = extension
        .with_deadline(Duration::from_secs(5), reply)
        .await
        .unwrap();
    assert!(chapters.is_empty());
    assert_eq!(extension.state(), ExtensionState::Ready);
}

#[tokio::test]
async fn test_fetch_image_decodes_base64() {
    let stub = StubBackend::new().with_response(Capability::FetchImage, json!("/wA="));
    let extension = load(&stub).await;

    let bytes = extension
        .fetch_image("1001", "https://example.org/r/1", "https://img.example.org/0.png")
        .unwrap()
        .await
        .unwrap();
    assert_eq!(bytes, vec![0xff, 0x00]);
}

#[tokio::test]
async fn test_extension_failure_keeps_message() {
    let stub = StubBackend::new().with_failure(Capability::Headers, "blocked by cloudflare");
    let extension = load(&stub).await;

    let err = extension.headers("1001").unwrap().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Extension);
    assert_eq!(err.extension_failure().unwrap().message(), "blocked by cloudflare");
    assert_eq!(extension.state(), ExtensionState::Ready);
}

#[tokio::test]
async fn test_wrong_payload_shape_is_decode_error() {
    let stub = StubBackend::new().with_response(Capability::PopularManga, json!(42));
    let extension = load(&stub).await;

    let err = extension.popular_manga("1001", 1).unwrap().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn test_worker_crash_rejects_pending_calls() {
    let stub = StubBackend::new()
        .with_panic(Capability::PageList)
        .with_delay(Capability::PageList, Duration::from_millis(50));
    let extension = load(&stub).await;

    let crashing = extension.page_list("1001", "/c/1").unwrap();
    let behind = extension.headers("1001").unwrap();

    assert!(matches!(crashing.await, Err(BridgeError::Worker(_))));
    assert!(matches!(behind.await, Err(BridgeError::Worker(_))));
}

#[tokio::test]
async fn test_instances_are_independent() {
    let first_stub = StubBackend::new();
    let second_stub = StubBackend::new();
    let first = load(&first_stub).await;
    let second = load(&second_stub).await;
    assert_ne!(first.instance_id(), second.instance_id());

    first.dispose();
    let headers = second.headers("1001").unwrap().await.unwrap();
    assert!(headers.is_empty());
    assert_eq!(second.state(), ExtensionState::Ready);
}
