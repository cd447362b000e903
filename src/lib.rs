pub mod dxrpc;
pub mod grpc;
pub mod registry;
pub mod rpc;
pub mod types;
