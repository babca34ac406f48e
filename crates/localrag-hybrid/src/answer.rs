use std::sync::Arc;

use localrag_core::traits::Generator;
use localrag_core::types::SearchResult;
use localrag_core::{Error, Result};
use localrag_resilience::{with_fallback, Resilience};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::RagEngine;
use crate::orchestrator::SearchOutcome;

pub const NO_CONTEXT_ANSWER: &str = "I cannot answer this question based on the provided documents. \
The documents do not contain relevant information about this topic.";
pub const UNAVAILABLE_ANSWER: &str = "The answer service is temporarily unavailable. Please try again in a moment.";
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Generated,
    NoRelevantContext,
    /// The generator was unreachable; a fixed reply was substituted.
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
    pub confidence: f32,
    pub sources: Vec<SearchResult>,
}

impl Answer {
    fn no_context() -> Self {
        Self { text: NO_CONTEXT_ANSWER.to_string(), kind: AnswerKind::NoRelevantContext, confidence: 0.0, sources: Vec::new() }
    }
}

/// Search, gate, then generate through the generator's resilience shell.
pub struct AnswerService {
    engine: Arc<RagEngine>,
    generator: Arc<dyn Generator>,
    guard: Resilience,
}

impl AnswerService {
    pub fn new(engine: Arc<RagEngine>, generator: Arc<dyn Generator>) -> Self {
        let guard = Resilience::from_settings(engine.breakers(), "generator", &engine.settings().resilience.generator);
        Self { engine, generator, guard }
    }

    pub fn build_context(results: &[SearchResult]) -> String {
        results.iter().map(|r| r.fragment.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let (results, confidence) = match self.engine.search(question).await? {
            SearchOutcome::Matches { results, confidence } => (results, confidence),
            SearchOutcome::NoRelevantMatch { .. } | SearchOutcome::Empty => return Ok(Answer::no_context()),
        };
        let context = Self::build_context(&results);
        let generator = &self.generator;
        let ctx = context.as_str();

        // When the check itself cannot run, let generation decide.
        let relevant = with_fallback(self.guard.call(move || generator.is_context_relevant(question, ctx)), |_| true).await;
        if !relevant {
            info!("generator judged context irrelevant");
            return Ok(Answer::no_context());
        }

        match self.guard.call(move || generator.generate(question, ctx)).await {
            Ok(text) => Ok(Answer { text, kind: AnswerKind::Generated, confidence, sources: results }),
            Err(e) if degrades(&e) => {
                warn!(error = %e, "generator unavailable, answering with fallback");
                Ok(Answer { text: UNAVAILABLE_ANSWER.to_string(), kind: AnswerKind::Degraded, confidence, sources: results })
            }
            Err(e) => Err(e),
        }
    }
}

fn degrades(e: &Error) -> bool {
    matches!(e, Error::CircuitOpen { .. }) || e.is_dependency_failure()
}
