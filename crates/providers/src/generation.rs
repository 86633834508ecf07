//! Generative-text providers and the model routing policy
//!
//! Providers are interchangeable behind the `Generator` trait; the
//! router holds an ordered chain per profile and tries each provider in
//! sequence until one returns a non-empty completion, ending in a
//! hardcoded default.

use async_trait::async_trait;
use seekr_common::config::{GenerationConfig, ModelSpec};
use seekr_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Sampling parameters for one generation call
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: 1400,
        }
    }
}

/// Trait for generative-text providers
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Provider + model identifier for logs
    fn id(&self) -> String;
}

/// Model profile selected per query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Plain factual queries
    Simple,
    /// Recency / analysis / comparison queries
    Deep,
    /// Story / poem / ad-copy queries
    Creative,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Simple => "simple",
            Profile::Deep => "deep",
            Profile::Creative => "creative",
        }
    }
}

/// OpenAI-compatible chat completions client
pub struct OpenAiChatGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAiChatGenerator {
    pub fn new(
        api_base: String,
        api_key: Option<String>,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Generator for OpenAiChatGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::Generation {
                message: format!("No API key configured for {}", self.id()),
            });
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("API error {}: {}", status, body),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse response: {}", e),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response".to_string(),
            })
    }

    fn id(&self) -> String {
        format!("openai:{}", self.model)
    }
}

/// Ordered provider chains, one per profile, each ending in the
/// hardcoded fallback
pub struct ModelRouter {
    simple: Vec<Arc<dyn Generator>>,
    deep: Vec<Arc<dyn Generator>>,
    creative: Vec<Arc<dyn Generator>>,
}

impl ModelRouter {
    pub fn from_config(config: &GenerationConfig) -> Self {
        let build = |spec: &ModelSpec| -> Option<Arc<dyn Generator>> {
            match spec.provider.as_str() {
                "openai" => OpenAiChatGenerator::new(
                    config.api_base.clone(),
                    config.api_key.clone(),
                    spec.model.clone(),
                    config.timeout_secs,
                )
                .ok()
                .map(|g| Arc::new(g) as Arc<dyn Generator>),
                other => {
                    warn!(provider = other, "Unknown generation provider, skipping");
                    None
                }
            }
        };

        let chain = |spec: &ModelSpec| -> Vec<Arc<dyn Generator>> {
            let mut providers = Vec::new();
            if let Some(primary) = build(spec) {
                providers.push(primary);
            }
            if spec.model != config.fallback.model || spec.provider != config.fallback.provider {
                if let Some(fallback) = build(&config.fallback) {
                    providers.push(fallback);
                }
            }
            providers
        };

        Self {
            simple: chain(&config.simple),
            deep: chain(&config.deep),
            creative: chain(&config.creative),
        }
    }

    /// Router over explicit chains, used in tests
    pub fn from_chains(
        simple: Vec<Arc<dyn Generator>>,
        deep: Vec<Arc<dyn Generator>>,
        creative: Vec<Arc<dyn Generator>>,
    ) -> Self {
        Self {
            simple,
            deep,
            creative,
        }
    }

    fn chain(&self, profile: Profile) -> &[Arc<dyn Generator>] {
        match profile {
            Profile::Simple => &self.simple,
            Profile::Deep => &self.deep,
            Profile::Creative => &self.creative,
        }
    }

    /// Try the profile's providers in order until one returns a
    /// non-empty completion
    pub async fn generate(
        &self,
        profile: Profile,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        let mut last_error: Option<AppError> = None;

        for provider in self.chain(profile) {
            let start = Instant::now();
            match provider.generate(prompt, params).await {
                Ok(text) if !text.trim().is_empty() => {
                    seekr_common::metrics::record_generation(
                        start.elapsed().as_secs_f64(),
                        profile.as_str(),
                        true,
                    );
                    return Ok(text);
                }
                Ok(_) => {
                    seekr_common::metrics::record_generation(
                        start.elapsed().as_secs_f64(),
                        profile.as_str(),
                        false,
                    );
                    warn!(provider = %provider.id(), "Empty completion, trying next provider");
                    last_error = Some(AppError::Generation {
                        message: format!("Empty completion from {}", provider.id()),
                    });
                }
                Err(e) => {
                    seekr_common::metrics::record_generation(
                        start.elapsed().as_secs_f64(),
                        profile.as_str(),
                        false,
                    );
                    warn!(provider = %provider.id(), error = %e, "Generation failed, trying next provider");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::Generation {
            message: "No generation providers configured".to_string(),
        }))
    }
}
