// ABOUTME: Test utilities for inkwell-agent, including a scripted model backend.
// ABOUTME: Used in tests to simulate provider replies and failures without real API calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use inkwell_core::{ProviderError, ProviderErrorCode};

use crate::backend::{ModelBackend, ModelRequest, ModelResponse, TokenUsage};

type Scripted = Result<String, ProviderErrorCode>;

/// A backend that replays queued results, then falls back to a fixed behavior.
///
/// Every call is counted and its request recorded, so tests can assert how
/// many attempts the gateway made and what prompt an agent built.
#[derive(Debug)]
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<Scripted>>,
    otherwise: Scripted,
    models: Vec<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    fn with_otherwise(otherwise: Scripted) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            otherwise,
            models: vec!["stub-model".to_string()],
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Always reply with the given text once the queue is drained.
    pub fn replying(text: &str) -> Self {
        Self::with_otherwise(Ok(text.to_owned()))
    }

    /// Always fail with the given code once the queue is drained.
    pub fn failing(code: ProviderErrorCode) -> Self {
        Self::with_otherwise(Err(code))
    }

    /// Queue one text reply.
    pub fn then_reply(self, text: &str) -> Self {
        self.lock_queue().push_back(Ok(text.to_owned()));
        self
    }

    /// Queue one failure.
    pub fn then_fail(self, code: ProviderErrorCode) -> Self {
        self.lock_queue().push_back(Err(code));
        self
    }

    /// Sleep before answering each call, so concurrent callers interleave.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Number of `complete` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.requests().pop()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let next = self.lock_queue().pop_front().unwrap_or_else(|| self.otherwise.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match next {
            Ok(text) => Ok(ModelResponse {
                text,
                model: "stub-model".to_owned(),
                usage: TokenUsage::default(),
            }),
            Err(code) => Err(ProviderError::new("stub/stub-model", code, "scripted failure")),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.models.clone())
    }

    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}
