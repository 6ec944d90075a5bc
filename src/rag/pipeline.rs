//! Question answering over the corpus.
//!
//! For a located question: zoning attributes → classification lines →
//! retrieval per line → grounded prompt → generation. A location with no
//! applicable zoning short-circuits before retrieval; it is an answer, not an
//! error.

use crate::llm::generator::Generator;
use crate::llm::stream::CompletionStream;
use crate::rag::prompt::{PromptComposer, extract_citations, format_zoning_attributes};
use crate::rag::retriever::{RetrievedChunk, Retriever};
use crate::types::{AppError, Result};
use crate::utils::toml_config::RetrievalConfig;
use crate::zoning::LayerProperties;
use tracing::{error, info, instrument};

/// Outcome of a question.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Grounded {
        text: String,
        /// Unit labels of the articles given to the model.
        citations: Vec<String>,
        /// Classification lines the retrieval was based on; empty for chat.
        classification: Vec<String>,
    },
    /// The location has no zoning for the configured plan revision.
    NoApplicableZoning,
}

/// Streaming counterpart of [`Answer`].
#[derive(Debug)]
pub enum StreamingAnswer {
    Grounded {
        stream: CompletionStream,
        citations: Vec<String>,
        classification: Vec<String>,
    },
    NoApplicableZoning,
}

struct Prepared {
    prompt: String,
    citations: Vec<String>,
    classification: Vec<String>,
}

pub struct AnswerPipeline {
    retriever: Retriever,
    composer: PromptComposer,
    generator: Generator,
    retrieval: RetrievalConfig,
}

impl AnswerPipeline {
    pub fn new(retriever: Retriever, generator: Generator, retrieval: RetrievalConfig) -> Self {
        Self {
            retriever,
            composer: PromptComposer::new(retrieval.max_context_chars),
            generator,
            retrieval,
        }
    }

    /// Classification lines for the configured plan revision.
    pub fn classify(&self, properties: &LayerProperties) -> Vec<String> {
        format_zoning_attributes(
            properties,
            &self.retrieval.plan_revision,
            &self.retrieval.excluded_fields,
        )
    }

    #[instrument(skip_all)]
    pub async fn answer(&self, properties: &LayerProperties, question: &str) -> Result<Answer> {
        let Some(prepared) = self.prepare_located(properties, question).await? else {
            return Ok(Answer::NoApplicableZoning);
        };

        let text = self
            .generator
            .generate(&prepared.prompt)
            .await
            .map_err(|e| log_failure("generation", e))?;

        Ok(Answer::Grounded {
            text,
            citations: prepared.citations,
            classification: prepared.classification,
        })
    }

    #[instrument(skip_all)]
    pub async fn answer_streaming(
        &self,
        properties: &LayerProperties,
        question: &str,
    ) -> Result<StreamingAnswer> {
        let Some(prepared) = self.prepare_located(properties, question).await? else {
            return Ok(StreamingAnswer::NoApplicableZoning);
        };

        let stream = self
            .generator
            .generate_streaming(&prepared.prompt)
            .await
            .map_err(|e| log_failure("generation", e))?;

        Ok(StreamingAnswer::Grounded {
            stream,
            citations: prepared.citations,
            classification: prepared.classification,
        })
    }

    /// Answer a question without a location, retrieving on the question itself.
    #[instrument(skip_all)]
    pub async fn chat(&self, question: &str) -> Result<Answer> {
        let prepared = self.prepare_chat(question).await?;

        let text = self
            .generator
            .generate(&prepared.prompt)
            .await
            .map_err(|e| log_failure("generation", e))?;

        Ok(Answer::Grounded {
            text,
            citations: prepared.citations,
            classification: prepared.classification,
        })
    }

    #[instrument(skip_all)]
    pub async fn chat_streaming(&self, question: &str) -> Result<StreamingAnswer> {
        let prepared = self.prepare_chat(question).await?;

        let stream = self
            .generator
            .generate_streaming(&prepared.prompt)
            .await
            .map_err(|e| log_failure("generation", e))?;

        Ok(StreamingAnswer::Grounded {
            stream,
            citations: prepared.citations,
            classification: prepared.classification,
        })
    }

    async fn prepare_located(
        &self,
        properties: &LayerProperties,
        question: &str,
    ) -> Result<Option<Prepared>> {
        validate_question(question)?;

        let classification = self.classify(properties);
        if classification.is_empty() {
            info!(
                layers = properties.len(),
                revision = %self.retrieval.plan_revision,
                "No applicable zoning for location"
            );
            return Ok(None);
        }

        let retrieved = self
            .retriever
            .retrieve_for_classification(&classification, self.retrieval.top_k)
            .await
            .map_err(|e| log_failure("retrieval", e))?;

        let chosen = self.chosen(&retrieved);
        let prompt = self
            .composer
            .compose_prompt(&classification, &texts(chosen), question);

        info!(
            classification = classification.len(),
            retrieved = retrieved.len(),
            chunks = chosen.len(),
            "Prepared grounded prompt"
        );

        Ok(Some(Prepared {
            prompt,
            citations: extract_citations(chosen.iter().map(|r| &r.chunk)),
            classification,
        }))
    }

    async fn prepare_chat(&self, question: &str) -> Result<Prepared> {
        validate_question(question)?;

        let retrieved = self
            .retriever
            .retrieve(question, self.retrieval.top_k)
            .await
            .map_err(|e| log_failure("retrieval", e))?;

        let chosen = self.chosen(&retrieved);
        let prompt = self.composer.compose_chat_prompt(&texts(chosen), question);

        Ok(Prepared {
            prompt,
            citations: extract_citations(chosen.iter().map(|r| &r.chunk)),
            classification: Vec::new(),
        })
    }

    /// The retrieved chunks that fit in the prompt; citations come from these only.
    fn chosen<'a>(&self, retrieved: &'a [RetrievedChunk]) -> &'a [RetrievedChunk] {
        &retrieved[..self.composer.within_budget(&texts(retrieved))]
    }
}

fn texts(retrieved: &[RetrievedChunk]) -> Vec<&str> {
    retrieved.iter().map(|r| r.chunk.text.as_str()).collect()
}

fn validate_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(AppError::InvalidInput("Question is empty".to_string()));
    }
    Ok(())
}

fn log_failure(stage: &str, err: AppError) -> AppError {
    error!(stage, error = %err, "Could not answer question");
    err
}
