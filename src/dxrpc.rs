// The RPC runtime the generated service bindings are written
// against: a connection that can invoke a method by its full name,
// static service descriptors, and a registrar that services are
// registered with. Transports live in `registry` (in-process) and
// `grpc` (tonic).

use crate::types::*;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Bindings check against this to make sure they are compatible with
/// the runtime they are compiled with.
pub const SUPPORT_PACKAGE_VERSION: u32 = 1;

/// Per-call context: deadline, cancellation and metadata. Clones
/// share the cancellation token, so cancelling any clone cancels
/// every call made with it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    metadata: HashMap<String, String>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Fail calls made with this context after `timeout` from now.
    /// An earlier deadline that is already set is kept. A timeout too
    /// large to represent sets no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Context {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Context {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Context {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn cancel(&self) {
        self.cancel.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Options that apply to a single call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOption {
    /// Fail the call if it doesn't complete in this long.
    Timeout(Duration),
    /// Send an extra metadata entry with the call.
    Header(String, String),
}

/// An encoded request as received by a handler. Handlers decode it
/// into the message type their method expects.
#[derive(Debug, Clone, Default)]
pub struct Payload(Bytes);

impl Payload {
    pub fn new(data: Bytes) -> Payload {
        Payload(data)
    }

    pub fn encode<M: prost::Message>(message: &M) -> Bytes {
        Bytes::from(message.encode_to_vec())
    }

    pub fn decode<M: prost::Message + Default>(&self) -> RpcResult<M> {
        Ok(M::decode(self.0.clone())?)
    }
}

/// A connection that can carry a unary call to a method named by its
/// full name ("package.Service.Method").
#[async_trait]
pub trait ClientConn: Send + Sync {
    /// Send `payload` to `method` and return the encoded reply.
    /// Errors are returned as produced by the transport.
    async fn invoke_raw(
        &self,
        ctx: &Context,
        method: &str,
        payload: Bytes,
        opts: &[CallOption],
    ) -> RpcResult<Bytes>;
}

#[async_trait]
impl<C: ClientConn + ?Sized> ClientConn for Arc<C> {
    async fn invoke_raw(
        &self,
        ctx: &Context,
        method: &str,
        payload: Bytes,
        opts: &[CallOption],
    ) -> RpcResult<Bytes> {
        (**self).invoke_raw(ctx, method, payload, opts).await
    }
}

/// Invoke `method` on `conn` with `input`, and decode the reply into
/// a fresh `O`. Honors the deadline and cancellation of `ctx` and any
/// timeout in `opts`.
pub async fn invoke<C, I, O>(
    conn: &C,
    ctx: &Context,
    method: &str,
    input: &I,
    opts: &[CallOption],
) -> RpcResult<O>
where
    C: ClientConn + ?Sized,
    I: prost::Message,
    O: prost::Message + Default,
{
    debug!("invoke({})", method);
    if ctx.is_cancelled() {
        return Err(RpcError::Cancelled);
    }
    let deadline = opts.iter().fold(ctx.deadline(), |deadline, opt| match opt {
        CallOption::Timeout(timeout) => match Instant::now().checked_add(*timeout) {
            Some(candidate) => Some(deadline.map_or(candidate, |d| d.min(candidate))),
            None => deadline,
        },
        _ => deadline,
    });
    let call = conn.invoke_raw(ctx, method, Payload::encode(input), opts);
    let reply = tokio::select! {
        reply = with_deadline(deadline, call) => reply?,
        _ = ctx.cancelled() => return Err(RpcError::Cancelled),
    };
    Ok(O::decode(reply)?)
}

async fn with_deadline<F>(deadline: Option<Instant>, call: F) -> RpcResult<Bytes>
where
    F: std::future::Future<Output = RpcResult<Bytes>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, call)
            .await
            .map_err(|_| RpcError::DeadlineExceeded)?,
        None => call.await,
    }
}

/// Split a full method name into service name and method name.
/// "a.b.Service.Method" -> ("a.b.Service", "Method").
pub fn split_method_name(full_name: &str) -> Option<(&str, &str)> {
    match full_name.rsplit_once('.') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {
            Some((service, method))
        }
        _ => None,
    }
}

/// Decode the request in the payload, call the service `S` and encode
/// its reply.
pub type Handler<S> = fn(Arc<S>, Context, Payload) -> BoxFuture<'static, RpcResult<Bytes>>;

pub struct MethodDesc<S: ?Sized + 'static> {
    pub method_name: &'static str,
    pub handler: Handler<S>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDesc {
    pub stream_name: &'static str,
    pub server_streams: bool,
    pub client_streams: bool,
}

/// Static description of a service: its name, the handler for each
/// unary method, its streams and the schema it was generated from.
/// The service trait object type `S` is what every handler is called
/// with.
pub struct ServiceDesc<S: ?Sized + 'static> {
    pub service_name: &'static str,
    pub methods: &'static [MethodDesc<S>],
    pub streams: &'static [StreamDesc],
    pub metadata: &'static str,
    /// Runtime version the bindings were written for.
    pub support_version: u32,
}

impl<S: ?Sized + 'static> ServiceDesc<S> {
    pub fn method(&self, method_name: &str) -> Option<&'static MethodDesc<S>> {
        self.methods.iter().find(|m| m.method_name == method_name)
    }

    pub fn full_method_name(&self, method: &MethodDesc<S>) -> String {
        format!("{}.{}", self.service_name, method.method_name)
    }
}

/// Something services can be registered with, so calls to them can
/// be routed.
pub trait ServiceRegistrar {
    fn register_service<S>(&mut self, desc: &'static ServiceDesc<S>, srv: Arc<S>) -> RpcResult<()>
    where
        S: ?Sized + Send + Sync + 'static;
}
