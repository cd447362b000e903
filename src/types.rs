use crate::dxrpc::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub type RpcResult<T> = std::result::Result<T, RpcError>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// Address of the supervisor. Should include address scheme
    /// (http://).
    pub supervisor_address: String,
    /// Give up on a call after this many seconds. Zero means wait
    /// forever.
    #[serde(default)]
    pub call_timeout: f32,
    /// Metadata attached to every call, eg, an auth token obtained
    /// from Authenticate.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> RpcResult<Config> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.call_timeout()?;
        Ok(config)
    }

    /// The per-call timeout, if any.
    pub fn call_timeout(&self) -> RpcResult<Option<Duration>> {
        if self.call_timeout == 0.0 {
            return Ok(None);
        }
        Duration::try_from_secs_f32(self.call_timeout)
            .map(Some)
            .map_err(|_| {
                RpcError::InvalidConfig(format!("call_timeout {} out of range", self.call_timeout))
            })
    }

    /// Build the context each call made by the command line client
    /// starts from. An out of range timeout is ignored.
    pub fn context(&self) -> Context {
        let mut ctx = Context::new();
        if let Ok(Some(timeout)) = self.call_timeout() {
            ctx = ctx.with_timeout(timeout);
        }
        for (key, value) in &self.metadata {
            ctx = ctx.with_metadata(key, value);
        }
        ctx
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    // Errors produced by the service itself.
    #[error("method {0} not implemented")]
    NotImplemented(&'static str),
    // Errors produced while moving a call between client and service.
    #[error("cannot decode payload: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("transport: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("remote: {0}")]
    Status(#[from] tonic::Status),
    #[error("unknown method {0}")]
    UnknownMethod(String),
    #[error("invalid method name {0}")]
    InvalidMethod(String),
    #[error("invalid metadata {0}")]
    InvalidMetadata(String),
    #[error("service {0} already registered")]
    DuplicateService(String),
    #[error("bindings written for runtime version {0}")]
    IncompatibleVersion(u32),
    #[error("call cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    // Errors from loading configuration and command line input.
    #[error("config: {0}")]
    InvalidConfig(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl RpcError {
    /// True if the method is not implemented, whether the error came
    /// from a local default base or from a remote server.
    pub fn is_unimplemented(&self) -> bool {
        match self {
            RpcError::NotImplemented(_) => true,
            RpcError::Status(status) => status.code() == tonic::Code::Unimplemented,
            _ => false,
        }
    }
}

impl From<RpcError> for tonic::Status {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Status(status) => status,
            RpcError::NotImplemented(_) | RpcError::UnknownMethod(_) => {
                tonic::Status::unimplemented(err.to_string())
            }
            RpcError::Decode(_) => tonic::Status::invalid_argument(err.to_string()),
            RpcError::Cancelled => tonic::Status::cancelled(err.to_string()),
            RpcError::DeadlineExceeded => tonic::Status::deadline_exceeded(err.to_string()),
            err => tonic::Status::internal(err.to_string()),
        }
    }
}
