//! The caller's handle to one loaded extension.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kura_core::{
    Capability, Chapter, ExtensionCall, Filter, Manga, MangasPage, Manifest, Page, SourceId,
    SourceInfo,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::pending::PendingCalls;
use crate::reply::{Reply, decode_image, decode_json};
use crate::state::ExtensionState;
use crate::worker::WorkerRequest;

/// Channel side of the handle, guarded together with the state so a call
/// can never slip past disposal.
#[derive(Debug)]
struct Channel {
    state: ExtensionState,
    requests: Option<mpsc::UnboundedSender<WorkerRequest>>,
    pump: Option<JoinHandle<()>>,
}

/// A loaded extension.
///
/// Each method dispatches its call immediately and returns a [`Reply`] that
/// resolves once the worker answers. Calls are answered in the order they
/// were made. Dropping the handle disposes it.
#[derive(Debug)]
pub struct LoadedExtension {
    id: Uuid,
    manifest: Manifest,
    sources: Vec<SourceInfo>,
    capabilities: Vec<Capability>,
    channel: Mutex<Channel>,
    pending: Arc<Mutex<PendingCalls>>,
}

impl LoadedExtension {
    pub(crate) fn new(
        manifest: Manifest,
        requests: mpsc::UnboundedSender<WorkerRequest>,
        pending: Arc<Mutex<PendingCalls>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            manifest,
            sources: Vec::new(),
            capabilities: Vec::new(),
            channel: Mutex::new(Channel {
                state: ExtensionState::Loading,
                requests: Some(requests),
                pump: None,
            }),
            pending,
        }
    }

    pub(crate) fn attach_pump(&self, pump: JoinHandle<()>) {
        self.lock_channel().pump = Some(pump);
    }

    /// Record the load results and start accepting calls.
    pub(crate) fn mark_ready(&mut self, capabilities: Vec<Capability>, sources: Vec<SourceInfo>) {
        self.capabilities = capabilities;
        self.sources = sources;
        self.transition(ExtensionState::Ready);
        info!(
            extension = %self.manifest.pkg,
            instance = %self.id,
            sources = self.sources.len(),
            "extension ready"
        );
    }

    /// Tear down after a failed load, returning to `Unloaded`.
    pub(crate) fn abandon(&self) {
        self.shut_down(ExtensionState::Unloaded);
    }

    /// Unique id of this load, used in logs.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    /// Static metadata of the extension.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Sources reported by the module at load.
    #[must_use]
    pub fn sources(&self) -> &[SourceInfo] {
        &self.sources
    }

    /// Look up one source by id.
    #[must_use]
    pub fn source(&self, id: &SourceId) -> Option<&SourceInfo> {
        self.sources.iter().find(|source| &source.id == id)
    }

    /// Capabilities the module exports.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ExtensionState {
        self.lock_channel().state
    }

    /// Number of calls dispatched and not yet answered.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.lock_pending().len()
    }

    /// Popular listing of a source.
    ///
    /// # Errors
    ///
    /// Fails without dispatching with [`BridgeError::Disposed`],
    /// [`BridgeError::UnknownSource`] or [`BridgeError::Unsupported`].
    pub fn popular_manga(
        &self,
        source_id: impl Into<SourceId>,
        page: u32,
    ) -> BridgeResult<Reply<MangasPage>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::PopularManga)?;
        self.dispatch(ExtensionCall::PopularManga { source_id, page }, decode_json)
    }

    /// Latest updates of a source.
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga); also
    /// [`BridgeError::Unsupported`] when the source has no latest listing.
    pub fn latest_updates(
        &self,
        source_id: impl Into<SourceId>,
        page: u32,
    ) -> BridgeResult<Reply<MangasPage>> {
        let source_id = source_id.into();
        let source = self.check_source(&source_id, Capability::LatestUpdates)?;
        if !source.supports_latest {
            return Err(BridgeError::unsupported(
                Capability::LatestUpdates,
                format!("source {source_id} has no latest listing"),
            ));
        }
        self.dispatch(ExtensionCall::LatestUpdates { source_id, page }, decode_json)
    }

    /// Search a source, optionally applying a filter list previously
    /// obtained from [`filter_list`](Self::filter_list).
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga); also
    /// [`BridgeError::Decode`] if the filters cannot be serialized.
    pub fn search_manga(
        &self,
        source_id: impl Into<SourceId>,
        page: u32,
        query: &str,
        filters: Option<&[Filter]>,
    ) -> BridgeResult<Reply<MangasPage>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::SearchManga)?;
        let filters = filters
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| BridgeError::Decode(format!("cannot encode filters: {e}")))?;
        self.dispatch(
            ExtensionCall::SearchManga {
                source_id,
                page,
                query: query.to_owned(),
                filters,
            },
            decode_json,
        )
    }

    /// Full details of an entry.
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga).
    pub fn manga_details(
        &self,
        source_id: impl Into<SourceId>,
        url: &str,
    ) -> BridgeResult<Reply<Manga>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::MangaDetails)?;
        self.dispatch(
            ExtensionCall::MangaDetails {
                source_id,
                url: url.to_owned(),
            },
            decode_json,
        )
    }

    /// Chapters of an entry.
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga).
    pub fn chapter_list(
        &self,
        source_id: impl Into<SourceId>,
        url: &str,
    ) -> BridgeResult<Reply<Vec<Chapter>>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::ChapterList)?;
        self.dispatch(
            ExtensionCall::ChapterList {
                source_id,
                url: url.to_owned(),
            },
            decode_json,
        )
    }

    /// Pages of a chapter.
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga).
    pub fn page_list(
        &self,
        source_id: impl Into<SourceId>,
        url: &str,
    ) -> BridgeResult<Reply<Vec<Page>>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::PageList)?;
        self.dispatch(
            ExtensionCall::PageList {
                source_id,
                url: url.to_owned(),
            },
            decode_json,
        )
    }

    /// Filters a source accepts in searches.
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga).
    pub fn filter_list(&self, source_id: impl Into<SourceId>) -> BridgeResult<Reply<Vec<Filter>>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::FilterList)?;
        self.dispatch(ExtensionCall::FilterList { source_id }, decode_json)
    }

    /// Raw bytes of a page image.
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga).
    pub fn fetch_image(
        &self,
        source_id: impl Into<SourceId>,
        page_url: &str,
        image_url: &str,
    ) -> BridgeResult<Reply<Vec<u8>>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::FetchImage)?;
        self.dispatch(
            ExtensionCall::FetchImage {
                source_id,
                page_url: page_url.to_owned(),
                image_url: image_url.to_owned(),
            },
            decode_image,
        )
    }

    /// Request headers a source expects.
    ///
    /// # Errors
    ///
    /// As [`popular_manga`](Self::popular_manga).
    pub fn headers(
        &self,
        source_id: impl Into<SourceId>,
    ) -> BridgeResult<Reply<BTreeMap<String, String>>> {
        let source_id = source_id.into();
        self.check_source(&source_id, Capability::Headers)?;
        self.dispatch(ExtensionCall::Headers { source_id }, decode_json)
    }

    /// Wait for `reply` at most `deadline`.
    ///
    /// When the deadline passes first the extension is disposed, so the
    /// worker stops taking calls.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Timeout`] on expiry, otherwise the reply's own
    /// result.
    pub async fn with_deadline<T>(&self, deadline: Duration, reply: Reply<T>) -> BridgeResult<T> {
        let call_id = reply.call_id();
        match tokio::time::timeout(deadline, reply).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    extension = %self.manifest.pkg,
                    call_id,
                    deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    "call deadline elapsed, disposing extension"
                );
                self.dispose();
                Err(BridgeError::Timeout(deadline))
            },
        }
    }

    /// Stop the extension.
    ///
    /// Every pending call is rejected with [`BridgeError::Cancelled`] in
    /// dispatch order, the reply pump is stopped and the request channel is
    /// closed so the worker drops the script engine once any in-flight call
    /// returns. Calling this again has no effect.
    pub fn dispose(&self) {
        self.shut_down(ExtensionState::Disposed);
    }

    fn shut_down(&self, next: ExtensionState) {
        {
            let mut channel = self.lock_channel();
            if !channel.state.can_transition_to(next) {
                return;
            }
            channel.state = next;
            channel.requests = None;
            if let Some(pump) = channel.pump.take() {
                pump.abort();
            }
        }

        let cancelled = self.lock_pending().drain_in_order();
        let count = cancelled.len();
        for call in cancelled {
            debug!(
                call_id = call.id,
                seq = call.seq,
                capability = %call.capability,
                source = ?call.source_id.as_ref().map(SourceId::as_str),
                "cancelling pending call"
            );
            call.reject(BridgeError::Cancelled);
        }

        info!(
            extension = %self.manifest.pkg,
            instance = %self.id,
            state = %next,
            cancelled = count,
            "extension shut down"
        );
    }

    fn transition(&self, next: ExtensionState) {
        let mut channel = self.lock_channel();
        if channel.state.can_transition_to(next) {
            channel.state = next;
        }
    }

    /// Fail fast for calls that can never succeed.
    fn check_source(&self, id: &SourceId, capability: Capability) -> BridgeResult<&SourceInfo> {
        if !self.state().accepts_calls() {
            return Err(BridgeError::Disposed);
        }
        let source = self
            .source(id)
            .ok_or_else(|| BridgeError::UnknownSource(id.clone()))?;
        if !self.capabilities.contains(&capability) {
            return Err(BridgeError::unsupported(
                capability,
                "not exported by the extension",
            ));
        }
        Ok(source)
    }

    /// Send `call` to the worker and return its reply.
    pub(crate) fn dispatch<T>(
        &self,
        call: ExtensionCall,
        decode: fn(Value) -> BridgeResult<T>,
    ) -> BridgeResult<Reply<T>> {
        let channel = self.lock_channel();
        if !channel.state.accepts_calls() {
            return Err(BridgeError::Disposed);
        }
        let Some(requests) = channel.requests.as_ref() else {
            return Err(BridgeError::Disposed);
        };

        let capability = call.capability();
        let (id, seq, rx) = self
            .lock_pending()
            .register(capability, call.source_id().cloned());

        debug!(
            extension = %self.manifest.pkg,
            call_id = id,
            seq,
            %capability,
            "dispatching extension call"
        );

        if requests.send(WorkerRequest { id, seq, call }).is_err() {
            self.lock_pending().take(id);
            return Err(BridgeError::Worker(
                "extension worker is not running".to_owned(),
            ));
        }

        Ok(Reply::new(id, rx, decode))
    }

    fn lock_channel(&self) -> std::sync::MutexGuard<'_, Channel> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingCalls> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LoadedExtension {
    fn drop(&mut self) {
        self.dispose();
    }
}
