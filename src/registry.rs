// In-process transport: services are registered into the registry and
// calls made through it are dispatched straight to their handlers,
// without going over the network.

use crate::dxrpc::{
    CallOption, ClientConn, Context, Payload, ServiceDesc, ServiceRegistrar,
    SUPPORT_PACKAGE_VERSION,
};
use crate::types::*;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type BoxedHandler =
    Arc<dyn Fn(Context, Payload) -> BoxFuture<'static, RpcResult<Bytes>> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    services: HashSet<&'static str>,
    /// Maps full method name to the handler bound to its service.
    methods: HashMap<String, BoxedHandler>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Full names of every method calls can be routed to, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn resolves(&self, full_method_name: &str) -> bool {
        self.methods.contains_key(full_method_name)
    }
}

impl ServiceRegistrar for Registry {
    fn register_service<S>(&mut self, desc: &'static ServiceDesc<S>, srv: Arc<S>) -> RpcResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        if desc.support_version != SUPPORT_PACKAGE_VERSION {
            return Err(RpcError::IncompatibleVersion(desc.support_version));
        }
        if !self.services.insert(desc.service_name) {
            return Err(RpcError::DuplicateService(desc.service_name.to_string()));
        }
        for method in desc.methods {
            let srv = Arc::clone(&srv);
            let handler = method.handler;
            self.methods.insert(
                desc.full_method_name(method),
                Arc::new(move |ctx: Context, payload: Payload| {
                    handler(Arc::clone(&srv), ctx, payload)
                }),
            );
        }
        info!(
            "registered {} with {} methods",
            desc.service_name,
            desc.methods.len()
        );
        Ok(())
    }
}

#[async_trait]
impl ClientConn for Registry {
    async fn invoke_raw(
        &self,
        ctx: &Context,
        method: &str,
        payload: Bytes,
        _opts: &[CallOption],
    ) -> RpcResult<Bytes> {
        debug!("dispatch({})", method);
        let handler = self
            .methods
            .get(method)
            .ok_or_else(|| RpcError::UnknownMethod(method.to_string()))?;
        handler(ctx.clone(), Payload::new(payload)).await
    }
}
