use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;

/// Instruction prepended to every prompt sent through [`Responder`].
pub const SYSTEM_INSTRUCTION: &str =
    "You're a helpful assistant in a Telegram chat. Respond concisely and friendly to: ";

/// What the user sees when generation fails for any reason.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't process that. Please try again later.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Gemini API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("response blocked: {0}")]
    Blocked(String),
    #[error("Gemini returned no text")]
    EmptyResponse,
}

/// Anything that turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        }
    }

    fn request_body(prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
            "generationConfig": {
                "temperature": 0.7,
                "topP": 1.0,
                "topK": 40,
                "maxOutputTokens": 2048,
            },
            "safetySettings": [
                { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
            ],
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    /// Single `generateContent` call, no retries.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let resp = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(prompt))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let gemini_resp: GeminiResponse = resp.json().await?;
        extract_text(gemini_resp)
    }
}

fn extract_text(resp: GeminiResponse) -> Result<String, LlmError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(LlmError::Blocked(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    if matches!(
        finish_reason.as_str(),
        "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT"
    ) {
        Err(LlmError::Blocked(finish_reason))
    } else {
        Err(LlmError::EmptyResponse)
    }
}

/// Prompt framing and failure policy on top of a [`TextGenerator`].
#[derive(Clone)]
pub struct Responder {
    generator: Arc<dyn TextGenerator>,
}

impl Responder {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let framed = format!("{SYSTEM_INSTRUCTION}{prompt}");
        self.generator.generate(&framed).await
    }

    /// Like [`Responder::generate`], but never fails: errors are logged and
    /// replaced with [`FALLBACK_REPLY`].
    pub async fn reply(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Gemini error: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Returns the same canned text (or an error) and records every prompt.
    pub struct ScriptedGenerator {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn replying(text: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(text.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or(LlmError::Api {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "scripted failure".to_string(),
            })
        }
    }
}
