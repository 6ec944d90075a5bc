//! Answer generation from a composed prompt.

use crate::llm::client::LLMClient;
use crate::llm::stream::CompletionStream;
use crate::rag::prompt::SYSTEM_PERSONA;
use crate::types::{AppError, Message, Result};
use crate::utils::timeout::with_timeout;
use async_stream::stream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Answers are generated deterministically.
const TEMPERATURE: f32 = 0.0;

/// Sends `[persona, prompt]` to the completion capability.
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn LLMClient>,
    persona: String,
    timeout: Duration,
}

impl Generator {
    /// `timeout` bounds a whole completion, or the wait for each fragment
    /// when streaming.
    pub fn new(client: Arc<dyn LLMClient>, persona: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            persona: persona.unwrap_or_else(|| SYSTEM_PERSONA.to_string()),
            timeout,
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    fn messages(&self, prompt: &str) -> Result<Vec<Message>> {
        if prompt.trim().is_empty() {
            return Err(AppError::InvalidInput("Prompt is empty".to_string()));
        }
        Ok(vec![Message::system(&self.persona), Message::user(prompt)])
    }

    #[instrument(skip(self, prompt), fields(model = %self.client.model_name()))]
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let messages = self.messages(prompt)?;
        let answer = with_timeout(
            self.timeout,
            "Completion",
            self.client.complete(&messages, TEMPERATURE),
        )
        .await?;

        debug!(chars = answer.len(), "Generated answer");
        Ok(answer)
    }

    /// Stream the answer.
    ///
    /// Opening the stream and waiting for each fragment are both bounded by
    /// the timeout; an expired wait yields a `Timeout` error and ends the
    /// stream. Dropping or closing the returned stream releases the
    /// underlying completion.
    pub async fn generate_streaming(&self, prompt: &str) -> Result<CompletionStream> {
        let messages = self.messages(prompt)?;
        let mut inner = with_timeout(
            self.timeout,
            "Opening completion stream",
            self.client.complete_stream(&messages, TEMPERATURE),
        )
        .await?;

        let idle = self.timeout;
        let guarded = stream! {
            loop {
                match tokio::time::timeout(idle, inner.next()).await {
                    Ok(Some(Ok(fragment))) => yield Ok(fragment),
                    Ok(Some(Err(e))) => {
                        yield Err(e);
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(AppError::Timeout(format!(
                            "No completion fragment within {:?}",
                            idle
                        )));
                        break;
                    }
                }
            }
            inner.close();
        };

        Ok(CompletionStream::new(Box::pin(guarded)))
    }
}
