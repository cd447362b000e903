// gRPC transport on top of tonic. Messages are encoded and decoded by
// the bindings, so the wire codec here only moves bytes around. A
// method "a.b.Service.Method" travels on the gRPC path
// "/a.b.Service/Method".

use crate::dxrpc::{
    split_method_name, CallOption, ClientConn, Context, MethodDesc, Payload, ServiceDesc,
};
use crate::types::*;
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::{http, Body, Poll, StdError};
use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::transport::{Channel, Endpoint};

/// Codec that passes already encoded messages through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoder;

#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawEncoder;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

impl Encoder for RawEncoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put(item);
        Ok(())
    }
}

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = tonic::Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}

/// Map a full method name to its gRPC path.
pub fn grpc_path(full_method_name: &str) -> RpcResult<http::uri::PathAndQuery> {
    let (service, method) = split_method_name(full_method_name)
        .ok_or_else(|| RpcError::InvalidMethod(full_method_name.to_string()))?;
    format!("/{}/{}", service, method)
        .parse()
        .map_err(|_| RpcError::InvalidMethod(full_method_name.to_string()))
}

/// Client side connection to a remote server.
#[derive(Debug, Clone)]
pub struct GrpcConn {
    inner: tonic::client::Grpc<Channel>,
}

impl GrpcConn {
    /// Attempt to create a new connection to the given endpoint.
    pub async fn connect<D>(dst: D) -> RpcResult<GrpcConn>
    where
        D: std::convert::TryInto<Endpoint>,
        D::Error: Into<StdError>,
    {
        let conn = Endpoint::new(dst)?.connect().await?;
        Ok(GrpcConn::new(conn))
    }

    pub fn new(channel: Channel) -> GrpcConn {
        GrpcConn {
            inner: tonic::client::Grpc::new(channel),
        }
    }
}

fn insert_metadata(request: &mut tonic::Request<Bytes>, key: &str, value: &str) -> RpcResult<()> {
    let key = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
        .map_err(|_| RpcError::InvalidMetadata(key.to_string()))?;
    let value: MetadataValue<Ascii> = value
        .parse()
        .map_err(|_| RpcError::InvalidMetadata(value.to_string()))?;
    request.metadata_mut().insert(key, value);
    Ok(())
}

#[async_trait]
impl ClientConn for GrpcConn {
    async fn invoke_raw(
        &self,
        ctx: &Context,
        method: &str,
        payload: Bytes,
        opts: &[CallOption],
    ) -> RpcResult<Bytes> {
        let path = grpc_path(method)?;
        let mut request = tonic::Request::new(payload);
        for (key, value) in ctx.metadata() {
            insert_metadata(&mut request, key, value)?;
        }
        for opt in opts {
            if let CallOption::Header(key, value) = opt {
                insert_metadata(&mut request, key, value)?;
            }
        }
        let mut grpc = self.inner.clone();
        grpc.ready().await.map_err(RpcError::Transport)?;
        let response = grpc.unary(request, path, RawCodec::default()).await?;
        Ok(response.into_inner())
    }
}

/// Server side tonic service that routes calls to the handlers listed
/// in a service descriptor.
pub struct DescriptorService<S: ?Sized + 'static> {
    desc: &'static ServiceDesc<S>,
    srv: Arc<S>,
}

impl<S: ?Sized + Send + Sync + 'static> DescriptorService<S> {
    pub fn new(desc: &'static ServiceDesc<S>, srv: Arc<S>) -> DescriptorService<S> {
        DescriptorService { desc, srv }
    }

    fn route(&self, path: &str) -> Option<&'static MethodDesc<S>> {
        let (service, method) = path.strip_prefix('/')?.split_once('/')?;
        if service != self.desc.service_name {
            return None;
        }
        self.desc.method(method)
    }
}

impl<S: ?Sized + 'static> Clone for DescriptorService<S> {
    fn clone(&self) -> Self {
        DescriptorService {
            desc: self.desc,
            srv: Arc::clone(&self.srv),
        }
    }
}

/// Headers owned by gRPC and HTTP/2 rather than by the caller.
fn is_transport_header(name: &str) -> bool {
    name.starts_with("grpc-")
        || matches!(
            name,
            "content-type" | "te" | "user-agent" | "content-length" | "accept-encoding"
        )
}

/// Parse a grpc-timeout value: at most 8 digits followed by a unit.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.is_empty() || !value.is_ascii() {
        return None;
    }
    let (amount, unit) = value.split_at(value.len() - 1);
    if amount.is_empty() || amount.len() > 8 {
        return None;
    }
    let amount: u64 = amount.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount * 60 * 60)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

/// Build the handler context from the metadata of an incoming call.
/// The caller's timeout becomes the context deadline.
fn context_from_metadata(metadata: &tonic::metadata::MetadataMap) -> Context {
    let mut ctx = Context::new();
    for (name, value) in metadata.clone().into_headers().iter() {
        let value = match value.to_str() {
            Ok(value) => value,
            Err(_) => continue,
        };
        if name.as_str() == "grpc-timeout" {
            match parse_grpc_timeout(value) {
                Some(timeout) => ctx = ctx.with_timeout(timeout),
                None => warn!("ignoring malformed grpc-timeout {:?}", value),
            }
        } else if !is_transport_header(name.as_str()) {
            ctx = ctx.with_metadata(name.as_str(), value);
        }
    }
    ctx
}

struct UnaryMethod<S: ?Sized + 'static> {
    srv: Arc<S>,
    method: &'static MethodDesc<S>,
}

impl<S: ?Sized + Send + Sync + 'static> tonic::server::UnaryService<Bytes> for UnaryMethod<S> {
    type Response = Bytes;
    type Future = tonic::codegen::BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

    fn call(&mut self, request: tonic::Request<Bytes>) -> Self::Future {
        debug!("dispatch({})", self.method.method_name);
        let ctx = context_from_metadata(request.metadata());
        let fut = (self.method.handler)(
            Arc::clone(&self.srv),
            ctx,
            Payload::new(request.into_inner()),
        );
        Box::pin(async move {
            fut.await
                .map(tonic::Response::new)
                .map_err(tonic::Status::from)
        })
    }
}

fn unimplemented_response() -> http::Response<tonic::body::BoxBody> {
    let mut response = http::Response::new(tonic::codegen::empty_body());
    let headers = response.headers_mut();
    headers.insert("grpc-status", http::HeaderValue::from_static("12"));
    headers.insert(
        "content-type",
        http::HeaderValue::from_static("application/grpc"),
    );
    response
}

impl<S, B> tonic::codegen::Service<http::Request<B>> for DescriptorService<S>
where
    S: ?Sized + Send + Sync + 'static,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = tonic::codegen::BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(
        &mut self,
        _cx: &mut tonic::codegen::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        match self.route(req.uri().path()) {
            Some(method) => {
                let method = UnaryMethod {
                    srv: Arc::clone(&self.srv),
                    method,
                };
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(RawCodec::default());
                    Ok(grpc.unary(method, req).await)
                })
            }
            None => {
                warn!("no method for path {}", req.uri().path());
                Box::pin(async move { Ok(unimplemented_response()) })
            }
        }
    }
}
