use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::llm::TextGenerator;
use crate::types::FusedResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

fn language_instruction(language: &str) -> &'static str {
    match language {
        "es" => "Responde en español.",
        "ar" => "أجب باللغة العربية.",
        _ => "Answer in English.",
    }
}

/// Grounded answer synthesis over fused retrieval results.
#[derive(Clone)]
pub struct ChatService {
    generator: Arc<dyn TextGenerator>,
    context_chunks: usize,
    history_messages: usize,
}

impl ChatService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            context_chunks: 5,
            history_messages: 5,
        }
    }

    pub fn with_limits(mut self, context_chunks: usize, history_messages: usize) -> Self {
        self.context_chunks = context_chunks;
        self.history_messages = history_messages;
        self
    }

    fn build_context(&self, chunks: &[FusedResult]) -> String {
        if chunks.is_empty() {
            return "No relevant context found.".to_string();
        }

        chunks
            .iter()
            .take(self.context_chunks)
            .enumerate()
            .map(|(i, chunk)| {
                format!("[Context {}] (Relevance: {:.3})\n{}", i + 1, chunk.rrf_score, chunk.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn build_history(&self, history: &[ChatMessage]) -> String {
        let start = history.len().saturating_sub(self.history_messages);
        history[start..]
            .iter()
            .map(|msg| format!("{}: {}", msg.role.to_uppercase(), msg.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn build_prompt(
        &self,
        query: &str,
        chunks: &[FusedResult],
        history: &[ChatMessage],
        language: &str,
    ) -> String {
        let mut prompt = format!(
            r#"You are a helpful AI assistant that answers questions based on the provided context from documents.

{}

Rules:
1. Answer the question using ONLY the information from the context provided below
2. If the context doesn't contain enough information to answer, say so clearly
3. Be concise but comprehensive
4. Cite which context section(s) you used in your answer
5. If multiple context sections are relevant, synthesize the information
6. Maintain conversation continuity by considering previous messages

"#,
            language_instruction(language)
        );

        let history_text = self.build_history(history);
        if !history_text.is_empty() {
            prompt.push_str(&format!("Previous Conversation:\n{}\n\n", history_text));
        }

        prompt.push_str(&format!(
            "Context from Documents:\n{}\n\nCurrent Question: {}\n\nAnswer:",
            self.build_context(chunks),
            query
        ));
        prompt
    }

    pub async fn respond(
        &self,
        query: &str,
        chunks: &[FusedResult],
        history: &[ChatMessage],
        language: &str,
    ) -> Result<String> {
        let prompt = self.build_prompt(query, chunks, history, language);
        let answer = self.generator
            .generate(&prompt)
            .await
            .context("Failed to generate answer")?;

        let answer = answer.trim().to_string();
        info!(chars = answer.len(), "Generated answer");
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("  grounded answer \n".to_string())
        }
    }

    fn fused(id: &str, score: f64, text: &str) -> FusedResult {
        FusedResult {
            id: id.to_string(),
            rrf_score: score,
            rank: 1,
            text: text.to_string(),
            language: "en".to_string(),
            method_scores: HashMap::new(),
            method_ranks: HashMap::new(),
        }
    }

    #[test]
    fn test_prompt_without_context() {
        let service = ChatService::new(Arc::new(RecordingGenerator::default()));
        let prompt = service.build_prompt("What is BM25?", &[], &[], "en");

        assert!(prompt.contains("Answer in English."));
        assert!(prompt.contains("No relevant context found."));
        assert!(!prompt.contains("Previous Conversation:"));
        assert!(prompt.ends_with("Current Question: What is BM25?\n\nAnswer:"));
    }

    #[test]
    fn test_prompt_limits_context_and_history() {
        let service = ChatService::new(Arc::new(RecordingGenerator::default()));
        let chunks: Vec<FusedResult> = (1..=7)
            .map(|i| fused(&format!("c{}", i), 0.1 / i as f64, &format!("chunk {}", i)))
            .collect();
        let history: Vec<ChatMessage> = (1..=7).map(|i| ChatMessage::user(format!("m{}", i))).collect();

        let prompt = service.build_prompt("q", &chunks, &history, "es");

        assert!(prompt.contains("Responde en español."));
        assert!(prompt.contains("[Context 1] (Relevance: 0.100)\nchunk 1"));
        assert!(prompt.contains("[Context 5]"));
        assert!(!prompt.contains("[Context 6]"));
        assert!(!prompt.contains("USER: m2"));
        assert!(prompt.contains("USER: m3\nUSER: m4"));
        assert!(prompt.contains("USER: m7"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        let service = ChatService::new(Arc::new(RecordingGenerator::default()));
        assert!(service.build_prompt("q", &[], &[], "de").contains("Answer in English."));
        assert!(service.build_prompt("q", &[], &[], "ar").contains("أجب باللغة العربية."));
    }

    #[tokio::test]
    async fn test_respond_trims_reply() {
        let generator = Arc::new(RecordingGenerator::default());
        let service = ChatService::new(generator.clone());

        let answer = service
            .respond("q", &[fused("c1", 0.5, "text")], &[ChatMessage::assistant("hi")], "en")
            .await
            .unwrap();

        assert_eq!(answer, "grounded answer");
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Previous Conversation:\nASSISTANT: hi"));
    }
}
