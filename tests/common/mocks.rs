//! Mock implementations for testing.
//!
//! Test doubles for the embedder, the completion capability and the zoning
//! map service, shared across the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zoneqa::llm::{CompletionStream, LLMClient};
use zoneqa::rag::Embedder;
use zoneqa::types::{AppError, Message, Result};
use zoneqa::zoning::{Coordinates, FeatureProperties, LayerOutcome, LayerSource, SkipReason};

// ============= Embedder =============

/// Bag-of-words embedder: every distinct lowercase token gets its own
/// dimension, assigned on first sight.
///
/// Texts sharing more tokens end up closer, which is enough to make
/// retrieval results predictable.
pub struct VocabularyEmbedder {
    dimensions: usize,
    vocabulary: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl VocabularyEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vocabulary: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vocabulary = self.vocabulary.lock().unwrap();
        let mut vector = vec![0.0; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let next = vocabulary.len();
            let slot = *vocabulary.entry(token.to_lowercase()).or_insert(next);
            vector[slot % self.dimensions] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for VocabularyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embedder whose service is always down.
pub struct FailingEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Err(AppError::EmbeddingService("Mock embedding failure".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ============= LLM Client =============

/// Mock completion client with configurable responses.
///
/// Records every conversation it receives and counts how many streams it
/// handed out were released.
///
/// # Examples
///
/// ```ignore
/// // Whole answer
/// let client = MockLLMClient::new("Resposta");
///
/// // Streamed answer, one fragment every 10ms
/// let client = MockLLMClient::streaming(&["Res", "posta"])
///     .with_fragment_delay(Duration::from_millis(10));
///
/// // Always fails
/// let client = MockLLMClient::failing();
/// ```
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    fragments: Vec<String>,
    should_fail: bool,
    response_delay: Option<Duration>,
    fragment_delay: Option<Duration>,
    releases: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fragments: vec![response.to_string()],
            should_fail: false,
            response_delay: None,
            fragment_delay: None,
            releases: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock client that streams `fragments`; `complete` returns
    /// them concatenated.
    pub fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::new(&fragments.concat())
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    /// Wait before answering (or before opening a stream).
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = Some(delay);
        self
    }

    /// Wait before each streamed fragment.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// How many streams have been released.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Conversations received so far, in call order.
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received.lock().unwrap().clone()
    }

    async fn begin(&self, messages: &[Message]) -> Result<()> {
        self.received.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.response_delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn complete(&self, messages: &[Message], _temperature: f32) -> Result<String> {
        self.begin(messages).await?;
        Ok(self.response.clone())
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        _temperature: f32,
    ) -> Result<CompletionStream> {
        self.begin(messages).await?;

        let delay = self.fragment_delay;
        let fragments = stream::iter(self.fragments.clone()).then(move |fragment| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, AppError>(fragment)
        });

        let releases = Arc::clone(&self.releases);
        Ok(CompletionStream::with_release(
            Box::pin(fragments),
            move || {
                releases.fetch_add(1, Ordering::SeqCst);
            },
        ))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ============= Layer Source =============

/// Scripted behaviour of one mock layer.
#[derive(Clone)]
pub enum MockLayer {
    Found(Vec<FeatureProperties>),
    Outside,
    Fail(String),
    /// Answers with no features after the delay.
    Slow(Duration),
}

/// Layer source answering from a script, tracking concurrent lookups.
#[derive(Clone, Default)]
pub struct MockLayerSource {
    layers: Vec<(String, MockLayer)>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockLayerSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, name: &str, layer: MockLayer) -> Self {
        self.layers.push((name.to_string(), layer));
        self
    }

    /// Highest number of lookups observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LayerSource for MockLayerSource {
    fn layers(&self) -> Vec<String> {
        self.layers.iter().map(|(name, _)| name.clone()).collect()
    }

    async fn lookup(&self, layer: &str, _coords: &Coordinates) -> Result<LayerOutcome> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let script = self
            .layers
            .iter()
            .find(|(name, _)| name == layer)
            .map(|(_, script)| script.clone());

        // Yield so that concurrent lookups overlap
        tokio::time::sleep(Duration::from_millis(5)).await;

        let outcome = match script {
            Some(MockLayer::Found(features)) => Ok(LayerOutcome::Found(features)),
            Some(MockLayer::Outside) => Ok(LayerOutcome::Skipped(SkipReason::OutsideExtent)),
            Some(MockLayer::Fail(message)) => Err(AppError::MapService(message)),
            Some(MockLayer::Slow(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(LayerOutcome::Found(Vec::new()))
            }
            None => Err(AppError::MapService(format!("Unknown layer {}", layer))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Feature properties from a JSON object literal.
pub fn feature(value: serde_json::Value) -> FeatureProperties {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("feature must be a JSON object, got {}", other),
    }
}
