// Bindings for the dxos.service.supervisor.Supervisor service, as
// described by proto/dxos/service/supervisor.proto.

use crate::dxrpc::{
    self, CallOption, ClientConn, Context, MethodDesc, Payload, ServiceDesc, ServiceRegistrar,
    SUPPORT_PACKAGE_VERSION,
};
use crate::grpc::{DescriptorService, GrpcConn};
use crate::types::*;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct InitAuthSequenceResponse {
    /// Nonce the client signs to authenticate.
    #[prost(bytes = "vec", tag = "1")]
    pub nonce: ::prost::alloc::vec::Vec<u8>,
    /// Public key of the KUBE identity.
    #[prost(bytes = "vec", tag = "2")]
    pub kube_key: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Authentication {
    #[prost(bytes = "vec", tag = "1")]
    pub signed_nonce: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub identity_key: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    #[prost(string, tag = "1")]
    pub token: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct GetConfigResponse {
    /// The serialized config document.
    #[prost(string, tag = "1")]
    pub config: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SetConfigRequest {
    #[prost(string, tag = "1")]
    pub config: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SetConfigResponse {}
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Service {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(enumeration = "ServiceStatus", tag = "2")]
    pub status: i32,
    #[prost(uint32, tag = "3")]
    pub pid: u32,
}
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct Services {
    #[prost(message, repeated, tag = "1")]
    pub services: ::prost::alloc::vec::Vec<Service>,
}
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum ServiceStatus {
    Unknown = 0,
    Starting = 1,
    Running = 2,
    Stopped = 3,
    Failed = 4,
}

const _: () = assert!(SUPPORT_PACKAGE_VERSION == 1);

pub const SUPERVISOR_SERVICE_NAME: &str = "dxos.service.supervisor.Supervisor";
pub const SUPERVISOR_AUTHENTICATE: &str = "dxos.service.supervisor.Supervisor.Authenticate";
pub const SUPERVISOR_INIT_AUTH_SEQUENCE: &str =
    "dxos.service.supervisor.Supervisor.InitAuthSequence";
pub const SUPERVISOR_GET_CONFIG: &str = "dxos.service.supervisor.Supervisor.GetConfig";
pub const SUPERVISOR_SET_CONFIG: &str = "dxos.service.supervisor.Supervisor.SetConfig";
pub const SUPERVISOR_STATUS: &str = "dxos.service.supervisor.Supervisor.Status";

/// Client API for the Supervisor service. Works over any connection;
/// errors from the connection are returned as is.
#[derive(Debug, Clone)]
pub struct SupervisorClient<C> {
    cc: C,
}

impl SupervisorClient<GrpcConn> {
    /// Attempt to create a new client by connecting to a given endpoint.
    pub async fn connect<D>(dst: D) -> RpcResult<Self>
    where
        D: std::convert::TryInto<tonic::transport::Endpoint>,
        D::Error: Into<tonic::codegen::StdError>,
    {
        Ok(Self::new(GrpcConn::connect(dst).await?))
    }
}

impl<C: ClientConn> SupervisorClient<C> {
    pub fn new(cc: C) -> Self {
        Self { cc }
    }

    /// Authenticate with KUBE.
    pub async fn authenticate(
        &self,
        ctx: &Context,
        request: &Authentication,
        opts: &[CallOption],
    ) -> RpcResult<AuthenticateResponse> {
        dxrpc::invoke(&self.cc, ctx, SUPERVISOR_AUTHENTICATE, request, opts).await
    }

    /// Init authentication sequence. Used to obtain nonce & KUBE
    /// identity (public key).
    pub async fn init_auth_sequence(
        &self,
        ctx: &Context,
        request: &(),
        opts: &[CallOption],
    ) -> RpcResult<InitAuthSequenceResponse> {
        dxrpc::invoke(&self.cc, ctx, SUPERVISOR_INIT_AUTH_SEQUENCE, request, opts).await
    }

    /// Read KUBE config.
    pub async fn get_config(
        &self,
        ctx: &Context,
        request: &(),
        opts: &[CallOption],
    ) -> RpcResult<GetConfigResponse> {
        dxrpc::invoke(&self.cc, ctx, SUPERVISOR_GET_CONFIG, request, opts).await
    }

    /// Set KUBE config.
    pub async fn set_config(
        &self,
        ctx: &Context,
        request: &SetConfigRequest,
        opts: &[CallOption],
    ) -> RpcResult<SetConfigResponse> {
        dxrpc::invoke(&self.cc, ctx, SUPERVISOR_SET_CONFIG, request, opts).await
    }

    /// Obtain KUBE status & list running services.
    pub async fn status(
        &self,
        ctx: &Context,
        request: &(),
        opts: &[CallOption],
    ) -> RpcResult<Services> {
        dxrpc::invoke(&self.cc, ctx, SUPERVISOR_STATUS, request, opts).await
    }
}

/// Server API for the Supervisor service. Every method defaults to
/// failing with `RpcError::NotImplemented`, so an implementation only
/// needs to override what it supports.
#[async_trait]
pub trait Supervisor: Send + Sync + 'static {
    /// Authenticate with KUBE.
    async fn authenticate(
        &self,
        _ctx: Context,
        _request: Authentication,
    ) -> RpcResult<AuthenticateResponse> {
        Err(RpcError::NotImplemented("Authenticate"))
    }
    /// Init authentication sequence. Used to obtain nonce & KUBE
    /// identity (public key).
    async fn init_auth_sequence(
        &self,
        _ctx: Context,
        _request: (),
    ) -> RpcResult<InitAuthSequenceResponse> {
        Err(RpcError::NotImplemented("InitAuthSequence"))
    }
    /// Read KUBE config.
    async fn get_config(&self, _ctx: Context, _request: ()) -> RpcResult<GetConfigResponse> {
        Err(RpcError::NotImplemented("GetConfig"))
    }
    /// Set KUBE config.
    async fn set_config(
        &self,
        _ctx: Context,
        _request: SetConfigRequest,
    ) -> RpcResult<SetConfigResponse> {
        Err(RpcError::NotImplemented("SetConfig"))
    }
    /// Obtain KUBE status & list running services.
    async fn status(&self, _ctx: Context, _request: ()) -> RpcResult<Services> {
        Err(RpcError::NotImplemented("Status"))
    }
}

fn authenticate_handler(
    srv: Arc<dyn Supervisor>,
    ctx: Context,
    dec: Payload,
) -> BoxFuture<'static, RpcResult<Bytes>> {
    async move {
        let request: Authentication = dec.decode()?;
        let response = srv.authenticate(ctx, request).await?;
        Ok(Payload::encode(&response))
    }
    .boxed()
}

fn init_auth_sequence_handler(
    srv: Arc<dyn Supervisor>,
    ctx: Context,
    dec: Payload,
) -> BoxFuture<'static, RpcResult<Bytes>> {
    async move {
        let request: () = dec.decode()?;
        let response = srv.init_auth_sequence(ctx, request).await?;
        Ok(Payload::encode(&response))
    }
    .boxed()
}

fn get_config_handler(
    srv: Arc<dyn Supervisor>,
    ctx: Context,
    dec: Payload,
) -> BoxFuture<'static, RpcResult<Bytes>> {
    async move {
        let request: () = dec.decode()?;
        let response = srv.get_config(ctx, request).await?;
        Ok(Payload::encode(&response))
    }
    .boxed()
}

fn set_config_handler(
    srv: Arc<dyn Supervisor>,
    ctx: Context,
    dec: Payload,
) -> BoxFuture<'static, RpcResult<Bytes>> {
    async move {
        let request: SetConfigRequest = dec.decode()?;
        let response = srv.set_config(ctx, request).await?;
        Ok(Payload::encode(&response))
    }
    .boxed()
}

fn status_handler(
    srv: Arc<dyn Supervisor>,
    ctx: Context,
    dec: Payload,
) -> BoxFuture<'static, RpcResult<Bytes>> {
    async move {
        let request: () = dec.decode()?;
        let response = srv.status(ctx, request).await?;
        Ok(Payload::encode(&response))
    }
    .boxed()
}

/// Descriptor of the Supervisor service, used to register an
/// implementation with a registrar or to serve it over gRPC.
pub static SUPERVISOR_SERVICE_DESC: ServiceDesc<dyn Supervisor> = ServiceDesc {
    service_name: SUPERVISOR_SERVICE_NAME,
    methods: &[
        MethodDesc {
            method_name: "Authenticate",
            handler: authenticate_handler,
        },
        MethodDesc {
            method_name: "InitAuthSequence",
            handler: init_auth_sequence_handler,
        },
        MethodDesc {
            method_name: "GetConfig",
            handler: get_config_handler,
        },
        MethodDesc {
            method_name: "SetConfig",
            handler: set_config_handler,
        },
        MethodDesc {
            method_name: "Status",
            handler: status_handler,
        },
    ],
    streams: &[],
    metadata: "dxos/service/supervisor.proto",
    support_version: SUPPORT_PACKAGE_VERSION,
};

pub fn register_supervisor_server<R: ServiceRegistrar>(
    registrar: &mut R,
    srv: Arc<dyn Supervisor>,
) -> RpcResult<()> {
    registrar.register_service(&SUPERVISOR_SERVICE_DESC, srv)
}

/// tonic service serving a Supervisor implementation.
pub type SupervisorServer = DescriptorService<dyn Supervisor>;

pub fn supervisor_server<T: Supervisor>(srv: T) -> SupervisorServer {
    let srv: Arc<dyn Supervisor> = Arc::new(srv);
    DescriptorService::new(&SUPERVISOR_SERVICE_DESC, srv)
}

impl tonic::transport::NamedService for DescriptorService<dyn Supervisor> {
    const NAME: &'static str = SUPERVISOR_SERVICE_NAME;
}
