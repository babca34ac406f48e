use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use localrag_cache::CacheLayer;
use localrag_core::config::Settings;
use localrag_core::traits::Generator;
use localrag_core::types::Chunk;
use localrag_core::{Error, Result};
use localrag_embed::HashingEmbedder;
use localrag_hybrid::answer::{CONTEXT_SEPARATOR, NO_CONTEXT_ANSWER, UNAVAILABLE_ANSWER};
use localrag_hybrid::{AnswerKind, AnswerService, Ingestor, RagEngine};
use localrag_core::store::InMemoryDocumentStore;
use localrag_resilience::CircuitState;
use parking_lot::Mutex;

#[derive(Clone, Copy)]
enum Reply {
    Text,
    Transient,
    Broken,
}

struct ScriptedGenerator {
    relevant: bool,
    reply: Reply,
    generate_calls: AtomicUsize,
    last_context: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    fn new(relevant: bool, reply: Reply) -> Arc<Self> {
        Arc::new(Self { relevant, reply, generate_calls: AtomicUsize::new(0), last_context: Mutex::new(None) })
    }

    fn calls(&self) -> usize { self.generate_calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock() = Some(context.to_string());
        match self.reply {
            Reply::Text => Ok(format!("answer to {question}")),
            Reply::Transient => Err(Error::TransientIo("connection reset".into())),
            Reply::Broken => Err(Error::InvalidConfig("model not found".into())),
        }
    }

    async fn is_context_relevant(&self, _question: &str, _context: &str) -> Result<bool> {
        Ok(self.relevant)
    }
}

async fn engine_with_corpus() -> Arc<RagEngine> {
    let mut settings = Settings::default();
    settings.embedding.dimension = 64;
    settings.resilience.generator.failure_threshold = 1;
    let embedder = Arc::new(HashingEmbedder::new(64).expect("embedder"));
    let engine = Arc::new(RagEngine::new(settings, embedder, CacheLayer::in_memory(), None).expect("engine"));
    engine.initialize().await.expect("init");
    let ingestor = Ingestor::new(engine.clone(), Arc::new(InMemoryDocumentStore::new()));
    let chunks = [
        Chunk::new("goats need fresh water and a dry shelter", "goats.txt"),
        Chunk::new("goats browse brush and need mineral salt", "goats.txt"),
    ];
    ingestor.ingest("goats.txt", b"goat care", &chunks).await.expect("ingest");
    engine
}

#[tokio::test(start_paused = true)]
async fn generates_from_joined_context() {
    let engine = engine_with_corpus().await;
    let generator = ScriptedGenerator::new(true, Reply::Text);
    let service = AnswerService::new(engine, generator.clone());

    let answer = service.answer("goats need fresh water and a dry shelter").await.expect("answer");
    assert_eq!(answer.kind, AnswerKind::Generated);
    assert_eq!(answer.text, "answer to goats need fresh water and a dry shelter");
    assert_eq!(answer.sources.len(), 2);
    assert!(answer.confidence > 0.0);
    let context = generator.last_context.lock().clone().expect("context");
    assert_eq!(context.matches(CONTEXT_SEPARATOR).count(), 1);
    assert!(context.starts_with("goats need fresh water"));
}

#[tokio::test(start_paused = true)]
async fn irrelevant_context_short_circuits() {
    let engine = engine_with_corpus().await;
    let generator = ScriptedGenerator::new(false, Reply::Text);
    let service = AnswerService::new(engine, generator.clone());

    let answer = service.answer("goats need fresh water and a dry shelter").await.expect("answer");
    assert_eq!(answer.kind, AnswerKind::NoRelevantContext);
    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_corpus_needs_no_generator() {
    let mut settings = Settings::default();
    settings.embedding.dimension = 16;
    let engine = Arc::new(RagEngine::new(settings, Arc::new(HashingEmbedder::new(16).expect("embedder")), CacheLayer::in_memory(), None).expect("engine"));
    let generator = ScriptedGenerator::new(true, Reply::Text);
    let service = AnswerService::new(engine, generator.clone());

    let answer = service.answer("anything").await.expect("answer");
    assert_eq!(answer.kind, AnswerKind::NoRelevantContext);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreachable_generator_degrades_then_opens_the_circuit() {
    let engine = engine_with_corpus().await;
    let generator = ScriptedGenerator::new(true, Reply::Transient);
    let service = AnswerService::new(engine.clone(), generator.clone());

    let first = service.answer("goats need fresh water and a dry shelter").await.expect("answer");
    assert_eq!(first.kind, AnswerKind::Degraded);
    assert_eq!(first.text, UNAVAILABLE_ANSWER);
    assert_eq!(generator.calls(), 3, "default policy makes three attempts");

    let breaker = engine.breakers().get("generator").expect("generator breaker");
    assert_eq!(breaker.state(), CircuitState::Open);

    let second = service.answer("goats need fresh water and a dry shelter").await.expect("answer");
    assert_eq!(second.kind, AnswerKind::Degraded);
    assert_eq!(generator.calls(), 3, "open circuit rejects before calling out");
}

#[tokio::test(start_paused = true)]
async fn non_dependency_errors_propagate() {
    let engine = engine_with_corpus().await;
    let generator = ScriptedGenerator::new(true, Reply::Broken);
    let service = AnswerService::new(engine.clone(), generator.clone());

    let err = service.answer("goats need fresh water and a dry shelter").await.expect_err("should fail");
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(generator.calls(), 1);
    let breaker = engine.breakers().get("generator").expect("generator breaker");
    assert_eq!(breaker.state(), CircuitState::Closed);
}
