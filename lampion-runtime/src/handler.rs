//! Typed handler functions and their uniform byte-level wrapping.
//!
//! User code supplies a function in one of three shapes — `f(event, ctx)`,
//! `f(event)`, or `f()` — and the matching adapter turns it into a
//! [`Handler`]. [`WrappedHandler`] then pairs a handler with a serializer to
//! expose the bytes-to-bytes invocation the bootstrap loop drives. Shape
//! selection happens at compile time through the adapter constructors; there
//! is no runtime dispatch table.

use std::future::Future;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::Context;
use crate::error::{BoxError, InvocationError};
use crate::serializer::PayloadSerializer;

/// An asynchronous function from an event (plus its [`Context`]) to an
/// output.
pub trait Handler<Event, Output> {
    /// Errors returned by this handler.
    type Error: Into<BoxError>;
    /// The future response value of this handler.
    type Fut: Future<Output = Result<Output, Self::Error>> + Send;
    /// Process the incoming event and return the response asynchronously.
    fn call(&mut self, event: Event, ctx: Context) -> Self::Fut;
}

/// Adapts a two-parameter `f(event, context)` function into a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

/// Adapts a one-parameter `f(event)` function that ignores the context.
pub fn event_handler_fn<F>(f: F) -> EventHandlerFn<F> {
    EventHandlerFn { f }
}

/// Adapts a zero-parameter `f()` function. The invocation payload is
/// deserialized and discarded; see [`NoEvent`].
pub fn unit_handler_fn<F>(f: F) -> UnitHandlerFn<F> {
    UnitHandlerFn { f }
}

/// A [`Handler`] implemented by an `f(event, context)` closure.
#[derive(Clone, Copy, Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, Event, Output, Error, Fut> Handler<Event, Output> for HandlerFn<F>
where
    F: FnMut(Event, Context) -> Fut,
    Error: Into<BoxError>,
    Fut: Future<Output = Result<Output, Error>> + Send,
{
    type Error = Error;
    type Fut = Fut;

    fn call(&mut self, event: Event, ctx: Context) -> Self::Fut {
        (self.f)(event, ctx)
    }
}

/// A [`Handler`] implemented by an `f(event)` closure.
#[derive(Clone, Copy, Debug)]
pub struct EventHandlerFn<F> {
    f: F,
}

impl<F, Event, Output, Error, Fut> Handler<Event, Output> for EventHandlerFn<F>
where
    F: FnMut(Event) -> Fut,
    Error: Into<BoxError>,
    Fut: Future<Output = Result<Output, Error>> + Send,
{
    type Error = Error;
    type Fut = Fut;

    fn call(&mut self, event: Event, _ctx: Context) -> Self::Fut {
        (self.f)(event)
    }
}

/// A [`Handler`] implemented by an `f()` closure.
#[derive(Clone, Copy, Debug)]
pub struct UnitHandlerFn<F> {
    f: F,
}

impl<F, Output, Error, Fut> Handler<NoEvent, Output> for UnitHandlerFn<F>
where
    F: FnMut() -> Fut,
    Error: Into<BoxError>,
    Fut: Future<Output = Result<Output, Error>> + Send,
{
    type Error = Error;
    type Fut = Fut;

    fn call(&mut self, _event: NoEvent, _ctx: Context) -> Self::Fut {
        (self.f)()
    }
}

/// Event stand-in for zero-parameter handlers: the payload is consumed and
/// discarded without binding to a type.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvent;

impl<'de> serde::Deserialize<'de> for NoEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(NoEvent)
    }
}

/// Pairs a typed handler with a serializer, exposing the uniform
/// bytes-to-bytes invocation the bootstrap loop drives.
pub struct WrappedHandler<H, S, Event, Output> {
    handler: H,
    serializer: S,
    _shape: PhantomData<fn(Event) -> Output>,
}

impl<H, S, Event, Output> WrappedHandler<H, S, Event, Output>
where
    H: Handler<Event, Output>,
    S: PayloadSerializer,
    Event: DeserializeOwned,
    Output: Serialize,
{
    pub fn new(handler: H, serializer: S) -> Self {
        Self {
            handler,
            serializer,
            _shape: PhantomData,
        }
    }

    /// Deserialize, call, serialize. A failure on either side of the user
    /// function — or from the function itself — is a per-invocation error.
    pub async fn invoke(&mut self, payload: Bytes, ctx: Context) -> Result<Bytes, InvocationError> {
        let event: Event = self
            .serializer
            .deserialize(&payload)
            .map_err(InvocationError::serialization)?;

        let output = self
            .handler
            .call(event, ctx)
            .await
            .map_err(|err| InvocationError::unhandled(err.into()))?;

        let bytes = self
            .serializer
            .serialize(&output)
            .map_err(InvocationError::serialization)?;
        Ok(Bytes::from(bytes))
    }
}
