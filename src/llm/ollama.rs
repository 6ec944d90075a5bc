use crate::llm::client::LLMClient;
use crate::llm::stream::CompletionStream;
use crate::types::{AppError, Message, MessageRole, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    models::ModelOptions,
};
use tracing::debug;

const DEFAULT_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

/// Split `scheme://host[:port]` into the host URL and port the Ollama builder expects.
fn split_base_url(base_url: &str) -> Result<(String, u16)> {
    let trimmed = base_url.trim_end_matches('/');
    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                AppError::Configuration(format!("Invalid Ollama port in '{}'", base_url))
            })?;
            (host, port)
        }
        None => (rest, DEFAULT_PORT),
    };

    if host.is_empty() {
        return Err(AppError::Configuration(format!(
            "Invalid Ollama base URL '{}'",
            base_url
        )));
    }

    Ok((format!("{}://{}", scheme, host), port))
}

fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| match m.role {
            MessageRole::System => ChatMessage::system(m.content.clone()),
            MessageRole::User => ChatMessage::user(m.content.clone()),
            MessageRole::Assistant => ChatMessage::assistant(m.content.clone()),
        })
        .collect()
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String) -> Result<Self> {
        let (host, port) = split_base_url(base_url)?;
        let host = reqwest::Url::parse(&host)
            .ok()
            .filter(|url| url.has_host())
            .ok_or_else(|| {
                AppError::Configuration(format!("Invalid Ollama base URL '{}'", base_url))
            })?;
        let client = Ollama::builder().host(host).port(port).build();

        Ok(Self { client, model })
    }

    fn request(&self, messages: &[Message], temperature: f32) -> ChatMessageRequest {
        ChatMessageRequest::new(self.model.clone(), to_chat_messages(messages))
            .options(ModelOptions::default().temperature(temperature))
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<String> {
        let response = self
            .client
            .send_chat_messages(self.request(messages, temperature))
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<CompletionStream> {
        let mut stream_response = self
            .client
            .send_chat_messages_stream(self.request(messages, temperature))
            .await
            .map_err(|e| AppError::LLM(format!("Ollama stream error: {}", e)))?;

        let output_stream = stream! {
            while let Some(chunk_result) = stream_response.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let content = chunk.message.content;
                        if !content.is_empty() {
                            yield Ok(content);
                        }
                        if chunk.done {
                            break;
                        }
                    }
                    Err(_) => {
                        yield Err(AppError::LLM("Stream chunk error".to_string()));
                        break;
                    }
                }
            }
        };

        let model = self.model.clone();
        Ok(CompletionStream::with_release(
            Box::pin(output_stream),
            move || debug!(model = %model, "Ollama stream released"),
        ))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
