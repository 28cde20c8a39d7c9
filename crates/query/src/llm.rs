use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EndpointConfig;

/// Free-text generation collaborator used for answer synthesis.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Answer generator backed by Ollama's `/api/generate`.
#[derive(Clone)]
pub struct QueryLLM {
    base_url: String,
    model: String,
    options: GenerationOptions,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Upper bound on answer tokens
    pub num_predict: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            num_predict: 512,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl QueryLLM {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            options: GenerationOptions::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_endpoints(endpoints: &EndpointConfig) -> Self {
        Self::new(endpoints.ollama_url.clone(), endpoints.llm_model.clone())
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options,
        }
    }
}

impl Default for QueryLLM {
    fn default() -> Self {
        Self::from_endpoints(&EndpointConfig::default())
    }
}

/// Trimmed answer text; a blank completion is an error.
fn answer_text(response: GenerateResponse) -> Result<String> {
    let answer = response.response.trim();
    if answer.is_empty() {
        anyhow::bail!("Ollama returned an empty answer");
    }
    Ok(answer.to_string())
}

#[async_trait]
impl TextGenerator for QueryLLM {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.client
            .post(self.endpoint())
            .json(&self.request(prompt))
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        answer_text(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_from_endpoints() {
        let endpoints = EndpointConfig {
            ollama_url: "http://gpu-box:11434/".to_string(),
            llm_model: "qwen2".to_string(),
            ..EndpointConfig::default()
        };
        let llm = QueryLLM::from_endpoints(&endpoints);
        assert_eq!(llm.endpoint(), "http://gpu-box:11434/api/generate");

        let body = serde_json::to_value(llm.request("hola")).unwrap();
        assert_eq!(body["model"], "qwen2");
        assert_eq!(body["prompt"], "hola");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 512);
    }

    #[test]
    fn test_default_targets_local_ollama() {
        assert_eq!(QueryLLM::default().endpoint(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_blank_answer_is_an_error() {
        let answer = answer_text(GenerateResponse {
            response: "  Madrid is the capital.\n".to_string(),
        })
        .unwrap();
        assert_eq!(answer, "Madrid is the capital.");

        let err = answer_text(GenerateResponse { response: " \n ".to_string() }).unwrap_err();
        assert!(err.to_string().contains("empty answer"));
    }
}
