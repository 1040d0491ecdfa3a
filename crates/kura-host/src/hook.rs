//! The `__kuraRequest` transport hook seen by modules.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use kura_transport::{WireRequest, WireResponse};
use rquickjs::prelude::Opt;
use rquickjs::{Ctx, Function, Object};

use crate::gateway::NetworkGateway;

/// Global name the hook is installed under.
pub const HOOK_NAME: &str = "__kuraRequest";

/// Install the transport hook into the namespace of `ctx`.
///
/// From the module's side the hook is
/// `__kuraRequest(url, method?, headersJson?, body?, wantBytes?)` and returns
/// `{status, statusText, headersJson, body, isBase64, error}` synchronously.
/// Installing again replaces the previous binding.
///
/// # Errors
///
/// Returns an engine error if the function cannot be created or bound.
pub fn install<'js>(ctx: &Ctx<'js>, gateway: Rc<RefCell<NetworkGateway>>) -> rquickjs::Result<()> {
    let hook = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>,
              url: String,
              method: Opt<Option<String>>,
              headers: Opt<Option<String>>,
              body: Opt<Option<String>>,
              want_bytes: Opt<Option<bool>>|
              -> rquickjs::Result<Object<'js>> {
            let response = match build_request(
                url,
                method.0.flatten(),
                headers.0.flatten(),
                body.0.flatten(),
                want_bytes.0.flatten().unwrap_or(false),
            ) {
                Ok(request) => gateway.borrow_mut().execute(&request),
                Err(message) => WireResponse::failure(message),
            };
            response_object(&ctx, &response)
        },
    )?;

    ctx.globals().set(HOOK_NAME, hook)
}

fn build_request(
    url: String,
    method: Option<String>,
    headers: Option<String>,
    body: Option<String>,
    want_bytes: bool,
) -> Result<WireRequest, String> {
    let mut request = WireRequest::get(url);
    if let Some(method) = method.filter(|m| !m.is_empty()) {
        request = request.with_method(method);
    }
    if let Some(headers) = headers.filter(|h| !h.trim().is_empty()) {
        let parsed: BTreeMap<String, String> = serde_json::from_str(&headers)
            .map_err(|e| format!("invalid headers JSON: {e}"))?;
        for (name, value) in parsed {
            request = request.with_header(name, value);
        }
    }
    if let Some(body) = body {
        request = request.with_body(body);
    }
    if want_bytes {
        request = request.with_bytes();
    }
    Ok(request)
}

fn response_object<'js>(ctx: &Ctx<'js>, response: &WireResponse) -> rquickjs::Result<Object<'js>> {
    let headers = serde_json::to_string(&response.headers).unwrap_or_else(|_| "{}".to_owned());

    let object = Object::new(ctx.clone())?;
    object.set("status", i32::from(response.status))?;
    object.set("statusText", response.status_text())?;
    object.set("headersJson", headers)?;
    object.set("body", response.body.as_str())?;
    object.set("isBase64", response.body.is_base64())?;
    object.set("error", response.error.as_deref())?;
    Ok(object)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kura_test::MockTransport;
    use kura_transport::RateLimiter;
    use rquickjs::{Context, Runtime};

    use super::*;

    fn with_hook<R>(transport: MockTransport, f: impl FnOnce(Ctx<'_>) -> R) -> R {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let gateway = Rc::new(RefCell::new(NetworkGateway::new(
            Arc::new(transport),
            RateLimiter::disabled(),
        )));
        context.with(|ctx| {
            install(&ctx, gateway).unwrap();
            f(ctx)
        })
    }

    #[test]
    fn test_hook_defaults() {
        let transport = MockTransport::new().with_text(200, "hello");
        let recorded = transport.clone();

        let (status, body) = with_hook(transport, |ctx| {
            let res: Object = ctx.eval("__kuraRequest('https://example.org/a')").unwrap();
            (res.get::<_, i32>("status").unwrap(), res.get::<_, String>("body").unwrap())
        });

        assert_eq!(status, 200);
        assert_eq!(body, "hello");
        let requests = recorded.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "GET");
        assert!(requests[0].headers.is_empty());
        assert!(!requests[0].want_bytes);
    }

    #[test]
    fn test_hook_passes_method_headers_and_body() {
        let transport = MockTransport::new().with_text(201, "created");
        let recorded = transport.clone();

        let status_text = with_hook(transport, |ctx| {
            let res: Object = ctx
                .eval(r#"__kuraRequest("https://example.org/api", "post", JSON.stringify({"X-Token": "t"}), "payload", true)"#)
                .unwrap();
            res.get::<_, String>("statusText").unwrap()
        });

        assert_eq!(status_text, "Created");
        let request = &recorded.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.headers["X-Token"], "t");
        assert_eq!(request.body.as_deref(), Some("payload"));
        assert!(request.want_bytes);
    }

    #[test]
    fn test_invalid_headers_are_reported_inline() {
        let (status, error) = with_hook(MockTransport::new(), |ctx| {
            let res: Object = ctx
                .eval("__kuraRequest('https://example.org', 'GET', '{not json')")
                .unwrap();
            (
                res.get::<_, i32>("status").unwrap(),
                res.get::<_, Option<String>>("error").unwrap(),
            )
        });
        assert_eq!(status, 0);
        assert!(error.unwrap().starts_with("invalid headers JSON"));
    }

    #[test]
    fn test_reinstall_replaces_binding() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let transport = MockTransport::new().with_text(200, "once");
        let gateway = Rc::new(RefCell::new(NetworkGateway::new(
            Arc::new(transport),
            RateLimiter::disabled(),
        )));

        context.with(|ctx| {
            install(&ctx, Rc::clone(&gateway)).unwrap();
            install(&ctx, Rc::clone(&gateway)).unwrap();

            let kind: String = ctx.eval("typeof __kuraRequest").unwrap();
            assert_eq!(kind, "function");
            let status: i32 = ctx.eval("__kuraRequest('https://example.org').status").unwrap();
            assert_eq!(status, 200);
        });
    }
}
