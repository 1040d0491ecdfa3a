//! The extension host: one isolated script namespace per loaded module.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use kura_core::{CallArg, ExtensionCall, SourceId, SourceInfo, envelope};
use kura_transport::{RateLimiter, Transport};
use rquickjs::function::Args;
use rquickjs::{CatchResultExt, Context, Runtime, Value};
use tracing::{debug, info};

use crate::error::{HostError, HostResult};
use crate::gateway::NetworkGateway;
use crate::hook;
use crate::surface::{self, ExportSurface};

/// Script engine limits for one host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostOptions {
    /// Heap limit in bytes, unlimited when `None`.
    pub memory_limit: Option<usize>,
    /// Stack limit in bytes, engine default when `None`.
    pub max_stack_size: Option<usize>,
}

impl HostOptions {
    /// Set the heap limit in bytes.
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Set the stack limit in bytes.
    #[must_use]
    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = Some(bytes);
        self
    }
}

/// Hosts a single compiled module.
///
/// Every host owns a fresh QuickJS runtime and context, so modules never see
/// each other's globals. The host must stay on the thread that created it.
pub struct ExtensionHost {
    context: Context,
    // Held so the runtime outlives every value created through `context`.
    _runtime: Runtime,
    gateway: Rc<RefCell<NetworkGateway>>,
    surface: Option<ExportSurface>,
}

impl std::fmt::Debug for ExtensionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHost")
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

impl ExtensionHost {
    /// Create a host with an empty namespace.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Engine`] if the runtime or context cannot be
    /// created.
    pub fn new(
        options: HostOptions,
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
    ) -> HostResult<Self> {
        let runtime = Runtime::new()?;
        if let Some(limit) = options.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = options.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        let context = Context::full(&runtime)?;

        Ok(Self {
            context,
            _runtime: runtime,
            gateway: Rc::new(RefCell::new(NetworkGateway::new(transport, limiter))),
            surface: None,
        })
    }

    /// Evaluate `code` and discover its export surface.
    ///
    /// The transport hook is installed before evaluation so module
    /// initialisers may already issue requests.
    ///
    /// # Errors
    ///
    /// - [`HostError::Script`] if evaluation throws
    /// - [`HostError::MissingExports`] / [`HostError::AmbiguousExports`] if
    ///   not exactly one marked object is found
    /// - [`HostError::MissingCapability`] if `getManifest` is absent
    /// - [`HostError::Protocol`] if a module was already loaded
    pub fn load(&mut self, code: &str) -> HostResult<ExportSurface> {
        if self.surface.is_some() {
            return Err(HostError::Protocol(
                "a module is already loaded in this host".to_owned(),
            ));
        }

        let gateway = Rc::clone(&self.gateway);
        let surface = self.context.with(|ctx| -> HostResult<ExportSurface> {
            hook::install(&ctx, gateway)?;
            ctx.eval::<Value, _>(code)
                .catch(&ctx)
                .map_err(|e| HostError::Script(e.to_string()))?;
            surface::discover(&ctx, code)
        })?;

        info!(
            binding = surface.binding(),
            capabilities = surface.capabilities().len(),
            "extension module loaded"
        );
        self.surface = Some(surface.clone());
        Ok(surface)
    }

    /// The discovered surface, once loaded.
    #[must_use]
    pub fn surface(&self) -> Option<&ExportSurface> {
        self.surface.as_ref()
    }

    /// Invoke the generated function for `call` and decode its envelope.
    ///
    /// Requests the module makes during the call are rate limited under the
    /// call's source id.
    ///
    /// # Errors
    ///
    /// - [`HostError::NotLoaded`] before [`load`](Self::load) succeeded
    /// - [`HostError::MissingCapability`] if the function is not exported
    /// - [`HostError::Script`] if the function throws
    /// - [`HostError::Protocol`] if it returns something other than a string
    /// - [`HostError::Envelope`] for extension failures and malformed envelopes
    pub fn call(&mut self, call: &ExtensionCall) -> HostResult<serde_json::Value> {
        let surface = self.surface.as_ref().ok_or(HostError::NotLoaded)?;
        let capability = call.capability();
        if !surface.exports(capability) {
            return Err(HostError::MissingCapability(capability));
        }

        debug!(%capability, source = ?call.source_id().map(SourceId::as_str), "invoking extension function");

        self.gateway
            .borrow_mut()
            .set_active_source(call.source_id().cloned());

        let text = self.context.with(|ctx| -> HostResult<String> {
            let (exports, function) = surface::lookup(&ctx, surface, capability)?;

            let arguments = call.arguments();
            let mut args = Args::new(ctx.clone(), arguments.len());
            args.this(exports)?;
            for argument in arguments {
                match argument {
                    CallArg::Text(text) => args.push_arg(text)?,
                    CallArg::Integer(n) => args.push_arg(n)?,
                }
            }

            let returned: Value = function
                .call_arg(args)
                .catch(&ctx)
                .map_err(|e| HostError::Script(e.to_string()))?;

            let Some(text) = returned.as_string() else {
                return Err(HostError::Protocol(format!(
                    "`{capability}` returned {:?} instead of envelope text",
                    returned.type_of()
                )));
            };
            text.to_string().map_err(HostError::from)
        });

        self.gateway.borrow_mut().set_active_source(None);

        Ok(envelope::unwrap(&text?)?)
    }

    /// Call `getManifest` and decode the source list.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call), plus a decode error if the result is not
    /// a list of sources.
    pub fn sources(&mut self) -> HostResult<Vec<SourceInfo>> {
        let value = self.call(&ExtensionCall::Manifest)?;
        serde_json::from_value(value).map_err(|e| HostError::Envelope(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use kura_core::{Capability, EnvelopeError};
    use kura_test::{MockTransport, fixtures};

    use super::*;

    fn host(transport: MockTransport) -> ExtensionHost {
        ExtensionHost::new(
            HostOptions::default(),
            Arc::new(transport),
            RateLimiter::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_load_discovers_surface() {
        let mut host = host(MockTransport::new());
        let surface = host.load(fixtures::SAMPLE_MODULE).unwrap();

        assert_eq!(surface.binding(), "kuraExtension");
        assert_eq!(surface.capabilities(), Capability::ALL.as_slice());
    }

    #[test]
    fn test_partial_surface_reports_exported_capabilities() {
        let mut host = host(MockTransport::new());
        let surface = host.load(fixtures::MINIMAL_MODULE).unwrap();

        assert!(surface.exports(Capability::Manifest));
        assert!(surface.exports(Capability::PopularManga));
        assert!(!surface.exports(Capability::SearchManga));

        let err = host
            .call(&ExtensionCall::FilterList {
                source_id: SourceId::new("1"),
            })
            .unwrap_err();
        assert!(matches!(err, HostError::MissingCapability(Capability::FilterList)));
    }

    #[test]
    fn test_missing_marker_fails_load() {
        let err = host(MockTransport::new())
            .load(fixtures::UNMARKED_MODULE)
            .unwrap_err();
        assert!(matches!(err, HostError::MissingExports));
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_two_markers_fail_load() {
        let err = host(MockTransport::new())
            .load(fixtures::DOUBLE_MARKED_MODULE)
            .unwrap_err();
        match err {
            HostError::AmbiguousExports(names) => assert_eq!(names, vec!["first", "second"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lexical_binding_is_discovered() {
        let mut host = host(MockTransport::new());
        let surface = host
            .load(
                r#"
                const ext = {
                    __generatedExports: {
                        getManifest() {
                            return JSON.stringify({ ok: true, data: [{ id: "5", name: "Lexical", lang: "en" }] });
                        }
                    }
                };
                "#,
            )
            .unwrap();

        assert_eq!(surface.binding(), "ext");
        let sources = host.sources().unwrap();
        assert_eq!(sources[0].id.as_str(), "5");
    }

    #[test]
    fn test_lexical_and_global_markers_are_ambiguous() {
        let err = host(MockTransport::new())
            .load(
                r#"
                var first = { __generatedExports: { getManifest: function () { return "{\"ok\":true,\"data\":[]}"; } } };
                let second = { __generatedExports: { getManifest: function () { return "{\"ok\":true,\"data\":[]}"; } } };
                "#,
            )
            .unwrap_err();
        match err {
            HostError::AmbiguousExports(names) => assert_eq!(names, vec!["first", "second"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_manifest_fails_load() {
        let err = host(MockTransport::new())
            .load(fixtures::MANIFESTLESS_MODULE)
            .unwrap_err();
        assert!(matches!(err, HostError::MissingCapability(Capability::Manifest)));
    }

    #[test]
    fn test_throwing_module_reports_message() {
        let err = host(MockTransport::new())
            .load(fixtures::THROWING_MODULE)
            .unwrap_err();
        match err {
            HostError::Script(message) => assert!(message.contains("module exploded")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_loads_are_isolated() {
        let mut first = host(MockTransport::new());
        first.load(fixtures::SAMPLE_MODULE).unwrap();

        // A second namespace does not see the first module's binding.
        let mut second = host(MockTransport::new());
        let err = second.load("var seen = typeof kuraExtension;").unwrap_err();
        assert!(matches!(err, HostError::MissingExports));
    }

    #[test]
    fn test_call_before_load() {
        let err = host(MockTransport::new())
            .call(&ExtensionCall::Manifest)
            .unwrap_err();
        assert!(matches!(err, HostError::NotLoaded));
    }

    #[test]
    fn test_sources_accept_numeric_ids() {
        let mut host = host(MockTransport::new());
        host.load(fixtures::SAMPLE_MODULE).unwrap();
        let sources = host.sources().unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id.as_str(), "1001");
        assert_eq!(sources[1].id.as_str(), "1002");
        assert!(!sources[1].supports_latest);
    }

    #[test]
    fn test_call_goes_through_transport() {
        let transport = MockTransport::new().with_text(200, fixtures::POPULAR_PAGE_JSON);
        let recorded = transport.clone();
        let mut host = host(transport);
        host.load(fixtures::SAMPLE_MODULE).unwrap();

        let page = host
            .call(&ExtensionCall::PopularManga {
                source_id: SourceId::new("1001"),
                page: 2,
            })
            .unwrap();

        assert_eq!(page["mangas"][0]["title"], "Blue Lantern");
        let requests = recorded.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://example.org/popular?page=2");
        assert_eq!(requests[0].headers["Referer"], "https://example.org/");
    }

    #[test]
    fn test_extension_failure_is_decoded() {
        let mut host = host(MockTransport::new().with_text(503, "down"));
        host.load(fixtures::SAMPLE_MODULE).unwrap();

        let err = host
            .call(&ExtensionCall::PopularManga {
                source_id: SourceId::new("1001"),
                page: 1,
            })
            .unwrap_err();
        let failure = match &err {
            HostError::Envelope(e) => e.as_extension_failure().unwrap(),
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(failure.message(), "HTTP 503 Service Unavailable");
    }

    #[test]
    fn test_structured_failure_keeps_detail() {
        let mut host = host(MockTransport::new());
        host.load(fixtures::SAMPLE_MODULE).unwrap();

        let err = host
            .call(&ExtensionCall::MangaDetails {
                source_id: SourceId::new("1001"),
                url: "/broken".into(),
            })
            .unwrap_err();
        let HostError::Envelope(EnvelopeError::Extension(failure)) = err else {
            panic!("expected extension failure");
        };
        assert_eq!(failure.detail().unwrap()["code"], 1);
    }

    #[test]
    fn test_search_passes_filters_only_when_present() {
        let mut host = host(MockTransport::new());
        host.load(fixtures::SAMPLE_MODULE).unwrap();

        let plain = host
            .call(&ExtensionCall::SearchManga {
                source_id: SourceId::new("1001"),
                page: 1,
                query: "lantern".into(),
                filters: None,
            })
            .unwrap();
        assert_eq!(plain["mangas"][0]["title"], "lantern");

        let filtered = host
            .call(&ExtensionCall::SearchManga {
                source_id: SourceId::new("1001"),
                page: 1,
                query: "lantern".into(),
                filters: Some("[]".into()),
            })
            .unwrap();
        assert_eq!(filtered["mangas"][0]["title"], "lantern (filtered)");
    }

    #[test]
    fn test_non_string_return_is_protocol_error() {
        let mut host = host(MockTransport::new());
        host.load(fixtures::WRONG_RETURN_MODULE).unwrap();

        let err = host
            .call(&ExtensionCall::Headers {
                source_id: SourceId::new("1"),
            })
            .unwrap_err();
        assert!(matches!(err, HostError::Protocol(_)));
    }

    #[test]
    fn test_second_load_is_rejected() {
        let mut host = host(MockTransport::new());
        host.load(fixtures::SAMPLE_MODULE).unwrap();
        assert!(matches!(
            host.load(fixtures::SAMPLE_MODULE),
            Err(HostError::Protocol(_))
        ));
    }
}
