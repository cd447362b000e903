use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use supervisor_rpc::dxrpc::{CallOption, Context};
use supervisor_rpc::grpc::GrpcConn;
use supervisor_rpc::rpc::*;
use supervisor_rpc::types::*;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

/// Answers every method with a reply derived from the request and the
/// call metadata.
struct Kube;

#[async_trait]
impl Supervisor for Kube {
    async fn authenticate(
        &self,
        _ctx: Context,
        request: Authentication,
    ) -> RpcResult<AuthenticateResponse> {
        if request.signed_nonce != b"signed" {
            return Err(RpcError::Status(tonic::Status::permission_denied(
                "bad signature",
            )));
        }
        Ok(AuthenticateResponse {
            token: "token-1".to_string(),
        })
    }
    async fn init_auth_sequence(
        &self,
        _ctx: Context,
        _request: (),
    ) -> RpcResult<InitAuthSequenceResponse> {
        Ok(InitAuthSequenceResponse {
            nonce: b"nonce".to_vec(),
            kube_key: b"kube".to_vec(),
        })
    }
    async fn get_config(&self, ctx: Context, _request: ()) -> RpcResult<GetConfigResponse> {
        let token = ctx
            .metadata()
            .get("authorization")
            .cloned()
            .unwrap_or_default();
        Ok(GetConfigResponse {
            config: format!("{{\"token\":\"{}\"}}", token),
        })
    }
    async fn set_config(
        &self,
        _ctx: Context,
        request: SetConfigRequest,
    ) -> RpcResult<SetConfigResponse> {
        if request.config.is_empty() {
            return Err(RpcError::Status(tonic::Status::invalid_argument(
                "empty config",
            )));
        }
        Ok(SetConfigResponse {})
    }
    async fn status(&self, _ctx: Context, _request: ()) -> RpcResult<Services> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Services {
            services: vec![
                Service {
                    name: "signal".to_string(),
                    status: ServiceStatus::Running as i32,
                    pid: 10,
                },
                Service {
                    name: "ipfs".to_string(),
                    status: ServiceStatus::Stopped as i32,
                    pid: 0,
                },
            ],
        })
    }
}

struct Nothing;

impl Supervisor for Nothing {}

async fn serve(server: SupervisorServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(server)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

async fn client_for(server: SupervisorServer) -> SupervisorClient<GrpcConn> {
    let addr = serve(server).await;
    SupervisorClient::connect(format!("http://{}", addr))
        .await
        .unwrap()
}

#[tokio::test]
async fn all_methods_over_grpc() {
    let client = client_for(supervisor_server(Kube)).await;
    let ctx = Context::new().with_metadata("authorization", "token-1");

    let init = client.init_auth_sequence(&ctx, &(), &[]).await.unwrap();
    assert_eq!(init.nonce, b"nonce");
    assert_eq!(init.kube_key, b"kube");

    let auth = Authentication {
        signed_nonce: b"signed".to_vec(),
        identity_key: b"me".to_vec(),
    };
    let token = client.authenticate(&ctx, &auth, &[]).await.unwrap();
    assert_eq!(token.token, "token-1");

    let config = client.get_config(&ctx, &(), &[]).await.unwrap();
    assert_eq!(config.config, "{\"token\":\"token-1\"}");

    let request = SetConfigRequest {
        config: "{}".to_string(),
    };
    assert_eq!(
        client.set_config(&ctx, &request, &[]).await.unwrap(),
        SetConfigResponse {}
    );

    let services = client.status(&ctx, &(), &[]).await.unwrap();
    let names: Vec<&str> = services.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["signal", "ipfs"]);
    assert_eq!(services.services[1].status(), ServiceStatus::Stopped);
}

#[tokio::test]
async fn header_option_reaches_service() {
    let client = client_for(supervisor_server(Kube)).await;
    let opts = [CallOption::Header(
        "authorization".to_string(),
        "from-option".to_string(),
    )];
    let config = client.get_config(&Context::new(), &(), &opts).await.unwrap();
    assert_eq!(config.config, "{\"token\":\"from-option\"}");
}

#[tokio::test]
async fn service_errors_pass_through() {
    let client = client_for(supervisor_server(Kube)).await;
    let ctx = Context::new();
    let auth = Authentication {
        signed_nonce: b"forged".to_vec(),
        identity_key: vec![],
    };
    match client.authenticate(&ctx, &auth, &[]).await {
        Err(RpcError::Status(status)) => {
            assert_eq!(status.code(), tonic::Code::PermissionDenied);
            assert_eq!(status.message(), "bad signature");
        }
        other => panic!("unexpected result {:?}", other),
    }
    let request = SetConfigRequest::default();
    match client.set_config(&ctx, &request, &[]).await {
        Err(RpcError::Status(status)) => assert_eq!(status.code(), tonic::Code::InvalidArgument),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn default_base_over_grpc_is_unimplemented() {
    let client = client_for(supervisor_server(Nothing)).await;
    let ctx = Context::new();
    let errors = vec![
        client
            .authenticate(&ctx, &Authentication::default(), &[])
            .await
            .unwrap_err(),
        client.init_auth_sequence(&ctx, &(), &[]).await.unwrap_err(),
        client.get_config(&ctx, &(), &[]).await.unwrap_err(),
        client
            .set_config(&ctx, &SetConfigRequest::default(), &[])
            .await
            .unwrap_err(),
        client.status(&ctx, &(), &[]).await.unwrap_err(),
    ];
    let methods = ["Authenticate", "InitAuthSequence", "GetConfig", "SetConfig", "Status"];
    for (err, method) in errors.iter().zip(methods) {
        assert!(err.is_unimplemented(), "{}: {:?}", method, err);
        match err {
            RpcError::Status(status) => {
                assert_eq!(status.message(), format!("method {} not implemented", method))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}

#[tokio::test]
async fn timeout_option_applies_to_remote_call() {
    let client = client_for(supervisor_server(Kube)).await;
    let opts = [CallOption::Timeout(Duration::from_millis(1))];
    let result = client.status(&Context::new(), &(), &opts).await;
    assert!(matches!(result, Err(RpcError::DeadlineExceeded)));
}

#[tokio::test]
async fn unknown_method_on_server() {
    let addr = serve(supervisor_server(Kube)).await;
    let conn = GrpcConn::connect(format!("http://{}", addr)).await.unwrap();
    let result: RpcResult<Services> = supervisor_rpc::dxrpc::invoke(
        &conn,
        &Context::new(),
        "dxos.service.supervisor.Supervisor.Restart",
        &(),
        &[],
    )
    .await;
    match result {
        Err(RpcError::Status(status)) => assert_eq!(status.code(), tonic::Code::Unimplemented),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn connect_to_closed_port_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let result = SupervisorClient::connect(format!("http://{}", addr)).await;
    assert!(matches!(result, Err(RpcError::Transport(_))));
}
