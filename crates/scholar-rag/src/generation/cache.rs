//! Per-model cache of generation backends

use dashmap::DashMap;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::providers::{LlmProvider, OllamaLlm};

use super::OllamaClient;

type Factory = Box<dyn Fn(&str) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;

/// Lazily built generation backends keyed by model name
///
/// The first request for a model constructs its backend while holding the
/// map shard, so concurrent first use still builds exactly one. Entries are
/// never evicted.
pub struct LlmCache {
    backends: DashMap<String, Arc<dyn LlmProvider>>,
    factory: Factory,
}

impl LlmCache {
    /// Create a cache that builds backends with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn LlmProvider>> + Send + Sync + 'static,
    {
        Self {
            backends: DashMap::new(),
            factory: Box::new(factory),
        }
    }

    /// Cache of Ollama backends sharing one HTTP client
    pub fn ollama(config: &LlmConfig) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(config)?);
        Ok(Self::new(move |model| {
            Ok(Arc::new(OllamaLlm::from_client(client.clone(), model)) as Arc<dyn LlmProvider>)
        }))
    }

    /// Backend for `model`, built on first use
    pub fn get_or_create(&self, model: &str) -> Result<Arc<dyn LlmProvider>> {
        if let Some(existing) = self.backends.get(model) {
            return Ok(existing.clone());
        }

        let entry = self.backends.entry(model.to_string());
        let backend = match entry {
            dashmap::mapref::entry::Entry::Occupied(occupied) => occupied.get().clone(),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                tracing::info!("Creating generation backend for model: {}", model);
                let backend = (self.factory)(model)?;
                vacant.insert(backend.clone());
                backend
            }
        };

        Ok(backend)
    }

    /// Number of cached backends
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(String);

    #[async_trait]
    impl LlmProvider for Named {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "named"
        }

        fn model(&self) -> &str {
            &self.0
        }
    }

    fn counting_cache() -> (Arc<LlmCache>, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let cache = LlmCache::new(move |model| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Named(model.to_string())) as Arc<dyn LlmProvider>)
        });
        (Arc::new(cache), builds)
    }

    #[test]
    fn test_one_backend_per_model() {
        let (cache, builds) = counting_cache();

        let a = cache.get_or_create("llama3.2:3b").unwrap();
        let b = cache.get_or_create("llama3.2:3b").unwrap();
        let c = cache.get_or_create("mistral").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(c.model(), "mistral");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let (cache, builds) = counting_cache();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get_or_create("shared").unwrap())
            })
            .collect();

        let backends: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(backends.iter().all(|b| Arc::ptr_eq(b, &backends[0])));
    }

    #[test]
    fn test_factory_error_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let cache = LlmCache::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(crate::error::Error::llm("unavailable"))
        });

        assert!(cache.get_or_create("m").is_err());
        assert!(cache.get_or_create("m").is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
