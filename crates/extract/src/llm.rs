use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prompt;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";

/// Ollama client constrained to JSON output, used for entity extraction.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct JsonRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: JsonOptions,
}

/// Extraction should be repeatable for the same chunk
#[derive(Serialize)]
struct JsonOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn request<'a>(&'a self, prompt: &'a str) -> JsonRequest<'a> {
        JsonRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            options: JsonOptions { temperature: 0.0 },
        }
    }

    pub async fn generate_json(&self, prompt: &str) -> Result<String> {
        let response = self.client
            .post(self.endpoint())
            .json(&self.request(prompt))
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }

    /// Generate and parse, asking the model to repair its own output
    /// whenever `parse` rejects it.
    pub async fn generate_parsed<T>(
        &self,
        prompt: &str,
        max_attempts: usize,
        parse: impl Fn(&str) -> Result<T> + Send + Sync,
    ) -> Result<T> {
        let mut current_prompt = prompt.to_string();

        for attempt in 1..=max_attempts {
            let response = self.generate_json(&current_prompt).await?;

            match parse(&response) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Model output rejected, asking for a repair"
                    );
                    current_prompt = prompt::build_retry_prompt(&response);
                }
            }
        }

        anyhow::bail!("No usable JSON after {} attempts", max_attempts)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL.to_string(), DEFAULT_MODEL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client() {
        let client = OllamaClient::default();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
        assert_eq!(client.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_request_asks_for_deterministic_json() {
        let client = OllamaClient::new("http://ollama:11434/".to_string(), "mistral".to_string());
        assert_eq!(client.endpoint(), "http://ollama:11434/api/generate");

        let body = serde_json::to_value(client.request("extract")).unwrap();
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.0);
    }

    #[tokio::test]
    async fn test_zero_attempts_fails_without_calling_out() {
        let client = OllamaClient::new("http://127.0.0.1:9".to_string(), DEFAULT_MODEL.to_string());
        let err = client
            .generate_parsed("prompt", 0, |s| Ok(s.to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("after 0 attempts"));
    }
}
