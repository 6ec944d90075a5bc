//! Prompt composition for grounded answers.
//!
//! Turns map-service zoning attributes into classification lines, lays out the
//! retrieved articles, and extracts the citations returned with an answer.

use crate::rag::corpus::Chunk;
use crate::zoning::LayerProperties;
use serde_json::Value;
use std::collections::HashSet;

/// Separator between the rendered values of one feature.
pub const FIELD_SEPARATOR: &str = " - ";

/// Delimiter line placed around each retrieved text.
pub const CHUNK_SEPARATOR: &str = "---------------------";

/// Default system persona for the generator.
pub const SYSTEM_PERSONA: &str = "\
You are an expert document analyst with a focus on legal documents from public municipalities called Plano Director Municipal.

I will provide you with:
1 - the classification of the location according to the Plano Director Municipal
2 - a series of relevant articles from the Plano Director Municipal that describe the details about the classification above
3 - a question about that particular location that I need an answer to, based on its location classification and the articles provided

You answer only to pertinent questions.
For every answer, always provide the article numbers (\"Artigo\"), sections (\"SECÇÃO\") or subsections (\"SUBSECÇÃO\") that support your answer and a summarized explanation.
Every reference to the articles should be done in ascending order. A paragraph per article reference is ideal.
Create clear paragraphs delimited by new lines, using markdown to bolden the article references.
You answer only in European Portuguese (PT-PT).";

/// Render zoning attributes as classification lines.
///
/// Only the first feature of each layer is considered, and only when its
/// `abstract` field equals `plan_revision`. Field values are joined with
/// [`FIELD_SEPARATOR`]; fields named in `excluded_fields` (case-insensitive),
/// nulls and empty strings are skipped. An empty result means no applicable
/// zoning.
pub fn format_zoning_attributes(
    properties: &LayerProperties,
    plan_revision: &str,
    excluded_fields: &[String],
) -> Vec<String> {
    let excluded: HashSet<String> = excluded_fields.iter().map(|f| f.to_lowercase()).collect();

    properties
        .values()
        .filter_map(|features| features.first())
        .filter(|feature| {
            feature
                .get("abstract")
                .and_then(Value::as_str)
                .is_some_and(|revision| revision.trim() == plan_revision)
        })
        .map(|feature| {
            feature
                .iter()
                .filter(|(key, _)| !excluded.contains(&key.to_lowercase()))
                .filter_map(|(_, value)| render_value(value))
                .collect::<Vec<_>>()
                .join(FIELD_SEPARATOR)
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        other => Some(other.to_string()),
    }
}

/// Unit labels of `chunks`, in order, without duplicates.
pub fn extract_citations<'a, I>(chunks: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .map(Chunk::label)
        .filter(|label| !label.is_empty())
        .filter(|label| seen.insert(*label))
        .map(str::to_string)
        .collect()
}

/// Builds the user prompt sent to the generator.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    max_context_chars: usize,
}

impl PromptComposer {
    /// `max_context_chars` bounds the retrieved text placed in a prompt. The
    /// first text is always included.
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// Prompt for a question about a classified location.
    pub fn compose_prompt<C, T>(
        &self,
        classification: &[C],
        chunks: &[T],
        question: &str,
    ) -> String
    where
        C: AsRef<str>,
        T: AsRef<str>,
    {
        let classification = classification
            .iter()
            .map(|line| line.as_ref())
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "In the Plano Director Municipal, the location is classified as:\n\
             \n\
             {classification}\n\
             \n\
             The relevant texts for the classification of this location are below:\n\
             \n\
             {context}\n\
             \n\
             Given the location classification and the texts from the Plano Director Municipal \
             that are provided, answer the question using only those texts.\n\
             \n\
             Question: {question}\n\
             Answer:",
            classification = classification,
            context = self.context_block(chunks),
            question = question.trim(),
        )
    }

    /// Prompt for a free-form question with no location.
    pub fn compose_chat_prompt<T: AsRef<str>>(&self, chunks: &[T], question: &str) -> String {
        format!(
            "The relevant texts from the Plano Director Municipal are below:\n\
             \n\
             {context}\n\
             \n\
             Given the texts from the Plano Director Municipal that are provided, \
             answer the question using only those texts.\n\
             \n\
             Question: {question}\n\
             Answer:",
            context = self.context_block(chunks),
            question = question.trim(),
        )
    }

    /// Number of leading `chunks` that fit in the context budget. The first
    /// chunk always fits.
    pub fn within_budget<T: AsRef<str>>(&self, chunks: &[T]) -> usize {
        let mut used = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            let len = chunk.as_ref().trim().chars().count();
            if i > 0 && used + len > self.max_context_chars {
                tracing::debug!(
                    included = i,
                    dropped = chunks.len() - i,
                    "Context budget reached"
                );
                return i;
            }
            used += len;
        }

        chunks.len()
    }

    fn context_block<T: AsRef<str>>(&self, chunks: &[T]) -> String {
        let mut block = String::from(CHUNK_SEPARATOR);

        for chunk in &chunks[..self.within_budget(chunks)] {
            block.push('\n');
            block.push_str(chunk.as_ref().trim());
            block.push('\n');
            block.push_str(CHUNK_SEPARATOR);
        }

        block
    }
}
