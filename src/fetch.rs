//! Read-through fetch: cache lookup, bounded dispatch, cache write
//!
//! Every request goes through the dispatcher. Only GET requests consult or
//! populate the cache, and only envelopes with `success: true` are stored.
//! Errors are forwarded untouched and never cached.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::dispatcher::RequestDispatcher;
use crate::transport::{ApiRequest, Transport, interpret, is_logical_success};
use crate::Result;

/// Request pipeline shared by all API operations
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    dispatcher: RequestDispatcher,
    cache: Option<Arc<ResponseCache>>,
}

impl Fetcher {
    /// Assemble a fetcher from parts
    ///
    /// Pass `None` as `cache` to disable read caching.
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: RequestDispatcher,
        cache: Option<Arc<ResponseCache>>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            cache,
        }
    }

    /// Build a fetcher from configuration
    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResponseCache::new(config.cache.ttl)));
        Self::new(transport, RequestDispatcher::new(&config.dispatcher), cache)
    }

    /// The dispatcher all requests go through
    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// The read cache, when enabled
    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Return a fresh cached value for `key`, or run `perform` through the
    /// dispatcher and cache its result when it reports logical success
    pub async fn cached_fetch_with<F, Fut>(&self, key: &str, perform: F) -> Result<Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let Some(cache) = self.cache.clone() else {
            return self.dispatcher.submit(perform).await;
        };

        if let Some(hit) = cache.get(key) {
            debug!(key, "Cache hit");
            return Ok(hit);
        }
        debug!(key, "Cache miss");

        let key = key.to_string();
        self.dispatcher
            .submit(move || async move {
                let value = perform().await?;
                if is_logical_success(&value) {
                    cache.set(&key, value.clone());
                }
                Ok(value)
            })
            .await
    }

    /// Fetch a request, using the cache for GETs
    pub async fn cached_fetch(&self, request: ApiRequest) -> Result<Value> {
        if !request.is_read() {
            return self.execute(request).await;
        }
        let key = request.cache_key();
        let transport = Arc::clone(&self.transport);
        self.cached_fetch_with(&key, move || perform(transport, request))
            .await
    }

    /// Send a request through the dispatcher without touching the cache
    pub async fn execute(&self, request: ApiRequest) -> Result<Value> {
        let transport = Arc::clone(&self.transport);
        self.dispatcher
            .submit(move || perform(transport, request))
            .await
    }

    /// Drop cached entries whose key contains `pattern`
    pub fn invalidate(&self, pattern: &str) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |cache| cache.invalidate(pattern))
    }
}

async fn perform(transport: Arc<dyn Transport>, request: ApiRequest) -> Result<Value> {
    let raw = transport.send(&request).await?;
    interpret(raw)
}
