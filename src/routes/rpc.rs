use super::service::ServiceObject;
use crate::codec::natives;
use crate::codec::{Callable, CodecError, Value};
use crate::comm::{Envelope, RemoteTarget, Transport};
use crate::error::Error;
use crate::membership::types::Node;
use crate::node::NodeContext;

use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Gid-local service that answers calls on exported functions.
pub const RPC_SERVICE: &str = "rpc";

/// Functions this node has exported for remote invocation, each under a
/// random method id of the `rpc` service.
pub struct RpcTable {
    service: Arc<ServiceObject>,
}

impl Default for RpcTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcTable {
    pub fn new() -> Self {
        Self {
            service: Arc::new(ServiceObject::new(RPC_SERVICE)),
        }
    }

    pub fn service(&self) -> Arc<ServiceObject> {
        self.service.clone()
    }

    /// Registers `handler` and returns a stub any node can call it through.
    pub fn export<F, Fut>(&self, node: &Node, handler: F) -> Callable
    where
        F: Fn(Arc<NodeContext>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Envelope> + Send + 'static,
    {
        let method = Uuid::new_v4().simple().to_string();
        self.service.register(&method, handler);
        tracing::debug!("Exported rpc {} on {}", method, node);
        Callable::Stub {
            node: node.clone(),
            method,
        }
    }

    pub fn revoke(&self, callable: &Callable) -> bool {
        match callable {
            Callable::Stub { method, .. } => self.service.remove(method),
            Callable::Native { .. } => false,
        }
    }

    pub fn len(&self) -> usize {
        self.service.len()
    }

    pub fn is_empty(&self) -> bool {
        self.service.is_empty()
    }
}

impl Callable {
    /// Calls the function. Natives run in place; stubs become an RPC to the
    /// node that exported them.
    pub async fn invoke(&self, transport: &Transport, args: Vec<Value>) -> Result<Value, Error> {
        match self {
            Callable::Native { module, path } => {
                let native = natives::resolve(module, path).ok_or_else(|| {
                    CodecError::UnsupportedType(format!(
                        "native {}.{} is not registered",
                        module,
                        path.join(".")
                    ))
                })?;
                native(&args)
            }
            Callable::Stub { node, method } => {
                let target = RemoteTarget::new(node.clone(), RPC_SERVICE, method);
                transport.call(&args, &target).await
            }
        }
    }
}

/// Builds a service from a `{method: callable}` mapping. Every method forwards
/// its arguments to the callable. `None` if the mapping holds anything but
/// callables.
pub fn service_from_descriptor(name: &str, descriptor: &Value) -> Option<ServiceObject> {
    let service = ServiceObject::new(name);
    for (method, entry) in descriptor.entries()? {
        let callable = entry.as_callable()?.clone();
        service.register(&method, move |ctx: Arc<NodeContext>, args| {
            let callable = callable.clone();
            async move { Envelope::from_result(callable.invoke(&ctx.comm, args).await) }
        });
    }
    Some(service)
}

/// The `{method: callable}` mapping of a set of callables, ready to ship with
/// `routes.put`.
pub fn descriptor<'a>(methods: impl IntoIterator<Item = (&'a str, Callable)>) -> Value {
    Value::object(
        methods
            .into_iter()
            .map(|(name, callable)| (name.to_string(), Value::Function(callable))),
    )
}
