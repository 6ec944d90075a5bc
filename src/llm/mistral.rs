//! Mistral chat completions over the OpenAI-compatible HTTP API.
//!
//! Streaming responses are server-sent events: one `data: {json}` line per
//! delta, terminated by `data: [DONE]`.

use crate::llm::client::LLMClient;
use crate::llm::stream::CompletionStream;
use crate::types::{AppError, Message, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub struct MistralClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    stream: bool,
}

/// One parsed server-sent event line.
#[derive(Debug, PartialEq)]
pub(crate) enum SseLine {
    Fragment(String),
    Done,
    Skip,
}

/// Parse one line of a chat completions event stream.
pub(crate) fn parse_sse_line(line: &str) -> Result<SseLine> {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        // Blank separators, comments and `event:` lines carry no content
        return Ok(SseLine::Skip);
    };

    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let parsed: Value = serde_json::from_str(data)
        .map_err(|e| AppError::LLM(format!("Invalid stream event: {}", e)))?;

    if let Some(message) = parsed["error"]["message"].as_str() {
        return Err(AppError::LLM(message.to_string()));
    }

    match parsed["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => Ok(SseLine::Fragment(content.to_string())),
        _ => Ok(SseLine::Skip),
    }
}

impl MistralClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        }
    }

    async fn send(
        &self,
        messages: &[Message],
        temperature: f32,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            stream,
        };

        debug!(model = %self.model, stream, "Mistral request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("Mistral request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!("Mistral API error {}: {}", status, body)));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMClient for MistralClient {
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<String> {
        let response = self.send(messages, temperature, false).await?;

        let resp: Value = response
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Invalid Mistral response: {}", e)))?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::LLM("Missing choices[0].message.content".to_string()))?
            .to_string();

        Ok(content)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        temperature: f32,
    ) -> Result<CompletionStream> {
        let response = self.send(messages, temperature, true).await?;
        let mut bytes = response.bytes_stream();

        let output_stream = stream! {
            let mut buffer: Vec<u8> = Vec::new();

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AppError::LLM(format!("Stream interrupted: {}", e)));
                        break 'read;
                    }
                };
                buffer.extend_from_slice(&chunk);

                // Only decode complete lines so multi-byte characters are never split
                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    let line = String::from_utf8_lossy(&line);

                    match parse_sse_line(line.trim_end_matches('\n')) {
                        Ok(SseLine::Fragment(text)) => yield Ok(text),
                        Ok(SseLine::Skip) => {}
                        Ok(SseLine::Done) => break 'read,
                        Err(e) => {
                            yield Err(e);
                            break 'read;
                        }
                    }
                }
            }
        };

        let model = self.model.clone();
        Ok(CompletionStream::with_release(
            Box::pin(output_stream),
            move || debug!(model = %model, "Mistral stream released"),
        ))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
