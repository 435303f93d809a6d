// ABOUTME: Provider gateway: dispatches model requests to registered backends with retry and fallback.
// ABOUTME: Backends are keyed by ProviderKey; one alternate enabled backend is tried after the primary fails.

use std::sync::Arc;

use inkwell_core::{ProviderDescriptor, ProviderError, ProviderErrorCode, ProviderKey, RequestLimits};

use crate::backend::{ModelBackend, ModelRequest, ModelResponse};
use crate::providers::create_backend;
use crate::retry::RetryPolicy;

struct BackendEntry {
    key: ProviderKey,
    backend: Arc<dyn ModelBackend>,
    limits: RequestLimits,
    enabled: bool,
}

/// The result of a successful `send`.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub response: ModelResponse,
    /// The backend that produced the response.
    pub served_by: ProviderKey,
    pub used_fallback: bool,
}

/// Owns every configured backend and routes requests to them.
pub struct ProviderGateway {
    entries: Vec<BackendEntry>,
    default_key: Option<ProviderKey>,
    retry: RetryPolicy,
}

impl ProviderGateway {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            entries: Vec::new(),
            default_key: None,
            retry,
        }
    }

    /// Build a gateway from descriptors. Descriptors that cannot produce a
    /// backend (e.g. a remote kind without an API key) are logged and left out.
    pub fn from_descriptors(
        descriptors: &[ProviderDescriptor],
        default_key: Option<ProviderKey>,
        retry: RetryPolicy,
    ) -> Self {
        let mut gateway = Self::new(retry);
        for descriptor in descriptors {
            if let Err(e) = gateway.register_descriptor(descriptor) {
                tracing::warn!(provider = %descriptor.key(), error = %e, "provider left unregistered");
            }
        }
        gateway.default_key = default_key;
        gateway
    }

    /// Build and register the backend for one descriptor.
    pub fn register_descriptor(&mut self, descriptor: &ProviderDescriptor) -> Result<(), ProviderError> {
        let backend = create_backend(descriptor)?;
        self.insert(BackendEntry {
            key: descriptor.key(),
            backend,
            limits: descriptor.limits,
            enabled: descriptor.enabled,
        });
        Ok(())
    }

    /// Register a backend under a key with default request limits.
    /// Replaces any backend already registered under that key.
    pub fn register(&mut self, key: ProviderKey, backend: Arc<dyn ModelBackend>) {
        self.insert(BackendEntry {
            key,
            backend,
            limits: RequestLimits::default(),
            enabled: true,
        });
    }

    fn insert(&mut self, entry: BackendEntry) {
        tracing::debug!(provider = %entry.key, enabled = entry.enabled, "registered backend");
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove a backend. Returns false when the key was not registered.
    pub fn remove(&mut self, key: &ProviderKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.key != key);
        before != self.entries.len()
    }

    /// Enable or disable a backend. Returns false when the key was not registered.
    pub fn set_enabled(&mut self, key: &ProviderKey, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| &e.key == key) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn set_default(&mut self, key: Option<ProviderKey>) {
        self.default_key = key;
    }

    pub fn default_key(&self) -> Option<&ProviderKey> {
        self.default_key.as_ref()
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> Vec<ProviderKey> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    pub fn contains(&self, key: &ProviderKey) -> bool {
        self.entries.iter().any(|e| &e.key == key)
    }

    pub fn is_enabled(&self, key: &ProviderKey) -> bool {
        self.entries.iter().any(|e| &e.key == key && e.enabled)
    }

    fn enabled_entry(&self, key: &ProviderKey) -> Option<&BackendEntry> {
        self.entries.iter().find(|e| &e.key == key && e.enabled)
    }

    /// The explicit key, else the configured default, else the first enabled backend.
    fn resolve(&self, key: Option<&ProviderKey>) -> Result<&BackendEntry, ProviderError> {
        if let Some(key) = key {
            return self
                .enabled_entry(key)
                .ok_or_else(|| ProviderError::not_configured(key));
        }

        if let Some(default) = &self.default_key
            && let Some(entry) = self.enabled_entry(default)
        {
            return Ok(entry);
        }

        self.entries.iter().find(|e| e.enabled).ok_or_else(|| {
            ProviderError::new(
                "gateway",
                ProviderErrorCode::NotConfigured,
                "no enabled backend registered",
            )
        })
    }

    /// First enabled backend, in registration order, that is not the primary.
    fn fallback_for(&self, primary: &ProviderKey) -> Option<&BackendEntry> {
        self.entries.iter().find(|e| e.enabled && &e.key != primary)
    }

    async fn attempt(&self, entry: &BackendEntry, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let mut request = request.clone();
        request.limits.get_or_insert(entry.limits);
        let request = &request;
        let label = entry.key.to_string();
        self.retry
            .run(&label, move |_| entry.backend.complete(request))
            .await
    }

    /// Dispatch a request with retry on the resolved backend, then exactly
    /// one fallback backend when the primary terminally fails.
    /// Non-retryable primary errors still get the one fallback attempt; an
    /// explicit key that is not registered fails at once.
    pub async fn send(
        &self,
        request: &ModelRequest,
        key: Option<&ProviderKey>,
    ) -> Result<GatewayResponse, ProviderError> {
        let primary = self.resolve(key)?;

        let primary_err = match self.attempt(primary, request).await {
            Ok(response) => {
                return Ok(GatewayResponse {
                    response,
                    served_by: primary.key.clone(),
                    used_fallback: false,
                });
            }
            Err(e) => e,
        };

        let Some(fallback) = self.fallback_for(&primary.key) else {
            tracing::error!(provider = %primary.key, error = %primary_err, "provider failed, no fallback available");
            return Err(primary_err);
        };

        tracing::warn!(
            provider = %primary.key,
            fallback = %fallback.key,
            error = %primary_err,
            "primary provider failed, trying fallback"
        );

        match self.attempt(fallback, request).await {
            Ok(response) => Ok(GatewayResponse {
                response,
                served_by: fallback.key.clone(),
                used_fallback: true,
            }),
            Err(e) => {
                tracing::error!(provider = %fallback.key, error = %e, "fallback provider failed");
                Err(e)
            }
        }
    }

    /// Dispatch to exactly one backend with retry and no fallback.
    pub async fn send_to(&self, request: &ModelRequest, key: &ProviderKey) -> Result<ModelResponse, ProviderError> {
        let entry = self.resolve(Some(key))?;
        self.attempt(entry, request).await
    }

    /// True when the backend is registered, enabled, and answers a model listing.
    pub async fn validate(&self, key: &ProviderKey) -> bool {
        match self.list_models(key).await {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(provider = %key, error = %e, "provider validation failed");
                false
            }
        }
    }

    pub async fn list_models(&self, key: &ProviderKey) -> Result<Vec<String>, ProviderError> {
        let entry = self.resolve(Some(key))?;
        entry.backend.list_models().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use inkwell_core::ProviderKind;

    fn key(model: &str) -> ProviderKey {
        ProviderKey::new(ProviderKind::Ollama, model)
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_serves_after_primary_times_out() {
        let primary = Arc::new(ScriptedBackend::failing(ProviderErrorCode::Timeout));
        let fallback = Arc::new(ScriptedBackend::replying("from fallback"));

        let mut gateway = ProviderGateway::new(RetryPolicy::default());
        gateway.register(key("primary"), primary.clone());
        gateway.register(key("secondary"), fallback.clone());

        let result = gateway.send(&ModelRequest::prompt("hi"), None).await.unwrap();

        assert_eq!(result.response.text, "from fallback");
        assert_eq!(result.served_by, key("secondary"));
        assert!(result.used_fallback);
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_fallback_is_tried() {
        let a = Arc::new(ScriptedBackend::failing(ProviderErrorCode::Server));
        let b = Arc::new(ScriptedBackend::failing(ProviderErrorCode::Server));
        let c = Arc::new(ScriptedBackend::replying("never reached"));

        let mut gateway = ProviderGateway::new(RetryPolicy::default());
        gateway.register(key("a"), a.clone());
        gateway.register(key("b"), b.clone());
        gateway.register(key("c"), c.clone());

        let err = gateway.send(&ModelRequest::prompt("hi"), None).await.unwrap_err();

        assert_eq!(err.code, ProviderErrorCode::Server);
        assert!(err.provider.contains("ollama"));
        assert_eq!(a.calls(), 3);
        assert_eq!(b.calls(), 3);
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_primary_failure_goes_straight_to_fallback() {
        let primary = Arc::new(ScriptedBackend::failing(ProviderErrorCode::Authentication));
        let fallback = Arc::new(ScriptedBackend::replying("ok"));

        let mut gateway = ProviderGateway::new(RetryPolicy::default());
        gateway.register(key("primary"), primary.clone());
        gateway.register(key("secondary"), fallback.clone());

        let result = gateway
            .send(&ModelRequest::prompt("hi"), Some(&key("primary")))
            .await
            .unwrap();
        assert_eq!(primary.calls(), 1);
        assert!(result.used_fallback);
    }

    #[tokio::test]
    async fn unknown_or_disabled_key_is_not_configured() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let mut gateway = ProviderGateway::new(RetryPolicy::no_retry());
        gateway.register(key("one"), backend.clone());

        let err = gateway
            .send(&ModelRequest::prompt("hi"), Some(&key("missing")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::NotConfigured);

        assert!(gateway.set_enabled(&key("one"), false));
        let err = gateway.send(&ModelRequest::prompt("hi"), None).await.unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::NotConfigured);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn default_key_wins_over_registration_order() {
        let first = Arc::new(ScriptedBackend::replying("first"));
        let second = Arc::new(ScriptedBackend::replying("second"));
        let mut gateway = ProviderGateway::new(RetryPolicy::no_retry());
        gateway.register(key("first"), first);
        gateway.register(key("second"), second);
        gateway.set_default(Some(key("second")));

        let result = gateway.send(&ModelRequest::prompt("hi"), None).await.unwrap();
        assert_eq!(result.response.text, "second");
        assert!(!result.used_fallback);
    }

    #[tokio::test]
    async fn gateway_fills_limits_from_entry() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let mut gateway = ProviderGateway::new(RetryPolicy::no_retry());
        gateway.register(key("one"), backend.clone());

        gateway.send(&ModelRequest::prompt("hi"), None).await.unwrap();
        let seen = backend.last_request().unwrap();
        assert_eq!(seen.limits, Some(RequestLimits::default()));
    }

    #[tokio::test]
    async fn validate_and_list_models() {
        let backend = Arc::new(ScriptedBackend::replying("ok").with_models(vec!["m1".to_string()]));
        let mut gateway = ProviderGateway::new(RetryPolicy::no_retry());
        gateway.register(key("one"), backend);

        assert!(gateway.validate(&key("one")).await);
        assert!(!gateway.validate(&key("two")).await);
        assert_eq!(gateway.list_models(&key("one")).await.unwrap(), vec!["m1"]);
    }

    #[test]
    fn descriptors_without_keys_are_skipped() {
        let descriptors = vec![
            ProviderDescriptor::new(ProviderKind::Anthropic, "claude-x"),
            ProviderDescriptor::new(ProviderKind::Ollama, "llama3.1"),
        ];
        let mut gateway = ProviderGateway::from_descriptors(&descriptors, None, RetryPolicy::default());
        assert_eq!(gateway.keys(), vec![key("llama3.1")]);
        assert!(gateway.remove(&key("llama3.1")));
        assert!(!gateway.contains(&key("llama3.1")));
    }
}
