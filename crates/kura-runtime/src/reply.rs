//! Typed futures for dispatched calls.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{BridgeError, BridgeResult};

/// The eventual result of a dispatched call.
///
/// The call is already on its way to the worker when a `Reply` exists;
/// dropping it only discards the result.
#[must_use = "the call is dispatched regardless; drop the reply to discard its result"]
pub struct Reply<T> {
    call_id: u64,
    rx: oneshot::Receiver<BridgeResult<Value>>,
    decode: fn(Value) -> BridgeResult<T>,
}

impl<T> Reply<T> {
    pub(crate) fn new(
        call_id: u64,
        rx: oneshot::Receiver<BridgeResult<Value>>,
        decode: fn(Value) -> BridgeResult<T>,
    ) -> Self {
        Self {
            call_id,
            rx,
            decode,
        }
    }

    /// Correlation id of the call.
    #[must_use]
    pub fn call_id(&self) -> u64 {
        self.call_id
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("call_id", &self.call_id)
            .finish_non_exhaustive()
    }
}

impl<T> Future for Reply<T> {
    type Output = BridgeResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(value))) => Poll::Ready((self.decode)(value)),
            Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(e)),
            // The sender was dropped without an answer.
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::Cancelled)),
        }
    }
}

pub(crate) fn decode_json<T: DeserializeOwned>(value: Value) -> BridgeResult<T> {
    serde_json::from_value(value).map_err(|e| BridgeError::Decode(e.to_string()))
}

pub(crate) fn decode_image(value: Value) -> BridgeResult<Vec<u8>> {
    let Value::String(encoded) = value else {
        return Err(BridgeError::Decode(
            "image data is not a base64 string".to_owned(),
        ));
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| BridgeError::Decode(format!("invalid base64 image data: {e}")))
}
