use crate::codec::Value;
use crate::comm::Envelope;
use crate::node::NodeContext;

use dashmap::DashMap;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Type-erased asynchronous method. The owning node's context is handed in at
/// call time, so a method never has to hold on to the node that routes to it.
pub type MethodFn = Arc<dyn Fn(Arc<NodeContext>, Vec<Value>) -> BoxFuture<'static, Envelope> + Send + Sync>;

/// A named bundle of methods reachable at `/{gid}/{name}/{method}`.
pub struct ServiceObject {
    name: String,
    methods: DashMap<String, MethodFn>,
}

impl ServiceObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Arc<NodeContext>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Envelope> + Send + 'static,
    {
        let method_fn: MethodFn = Arc::new(move |ctx, args| Box::pin(handler(ctx, args)));
        self.methods.insert(method.to_string(), method_fn);
        tracing::debug!("Registered {}.{}", self.name, method);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F, Fut>(self, method: &str, handler: F) -> Self
    where
        F: Fn(Arc<NodeContext>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Envelope> + Send + 'static,
    {
        self.register(method, handler);
        self
    }

    pub fn method(&self, method: &str) -> Option<MethodFn> {
        self.methods.get(method).map(|entry| entry.value().clone())
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn remove(&self, method: &str) -> bool {
        self.methods.remove(method).is_some()
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Runs a method. `None` when the service has no such method.
    pub async fn call(
        &self,
        ctx: Arc<NodeContext>,
        method: &str,
        args: Vec<Value>,
    ) -> Option<Envelope> {
        let method_fn = self.method(method)?;
        Some(method_fn(ctx, args).await)
    }
}

impl std::fmt::Debug for ServiceObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceObject")
            .field("name", &self.name)
            .field("methods", &self.method_names())
            .finish()
    }
}
