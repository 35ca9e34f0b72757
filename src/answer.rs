//! Answer generation against a hosted chat-completion service.
//!
//! Retrieved chunk texts are joined into one context block, inserted with
//! the question into a fixed prompt template, and sent synchronously to an
//! OpenAI-compatible endpoint (Groq by default). Calls are never retried:
//! the chat layer turns an error into a visible error-string answer so the
//! interactive surface stays usable.

use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::models::RetrievedChunk;

/// The instruction wrapper around retrieved context and the question.
const PROMPT_TEMPLATE: &str = "You are a helpful assistant answering questions based on the given context.
Use only the information from the context below. If you cannot answer based on the context, say \"I cannot find this information in the document.\"

Context:
{context}

Question: {question}

Answer:";

/// Join retrieved chunk texts into the context block, separated by blank
/// lines.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the prompt template with the context block and question.
pub fn build_prompt(chunks: &[RetrievedChunk], question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", &format_context(chunks))
        .replace("{question}", question)
}

/// Read the generation API key from the configured environment variable.
/// Missing credentials are a fail-fast error with a pointer at the fix.
pub fn api_key(config: &GenerationConfig) -> Result<String> {
    std::env::var(&config.api_key_env).map_err(|_| {
        anyhow::anyhow!(
            "No API key found. Set the {} environment variable.",
            config.api_key_env
        )
    })
}

/// Call the chat-completion endpoint with the finished prompt and return
/// the generated answer text. One attempt, no retries.
pub async fn generate_answer(config: &GenerationConfig, prompt: &str) -> Result<String> {
    let key = api_key(config)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.model,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
        "messages": [{ "role": "user", "content": prompt }],
    });

    let response = client
        .post(&config.api_url)
        .header("Authorization", format!("Bearer {}", key))
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Generation request to {} failed", config.api_url))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Generation API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response
        .json()
        .await
        .context("Generation API returned invalid JSON")?;

    parse_answer(&json)
}

/// Pull `choices[0].message.content` out of the response.
fn parse_answer(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Generation API response missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;

    fn chunk(text: &str, page: u32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: format!("c{}", page),
            document_id: "d1".to_string(),
            text: text.to_string(),
            score: 0.9,
            page,
            kind: ContentKind::Text,
            source: "doc.pdf".to_string(),
        }
    }

    #[test]
    fn context_joins_with_blank_lines() {
        let chunks = vec![chunk("first", 1), chunk("second", 2)];
        assert_eq!(format_context(&chunks), "first\n\nsecond");
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let chunks = vec![chunk("The budget was 40 million.", 3)];
        let prompt = build_prompt(&chunks, "What was the budget?");
        assert!(prompt.contains("Context:\nThe budget was 40 million."));
        assert!(prompt.contains("Question: What was the budget?"));
        assert!(prompt.contains("I cannot find this information in the document."));
        assert!(prompt.ends_with("Answer:"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn empty_retrieval_still_builds_prompt() {
        let prompt = build_prompt(&[], "Anything?");
        assert!(prompt.contains("Context:\n\n"));
    }

    #[test]
    fn parse_answer_happy_path() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  42  " } }]
        });
        assert_eq!(parse_answer(&json).unwrap(), "42");
    }

    #[test]
    fn parse_answer_rejects_malformed_response() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_answer(&json).is_err());
        let json = serde_json::json!({ "error": { "message": "rate limited" } });
        assert!(parse_answer(&json).is_err());
    }

    #[test]
    fn missing_api_key_is_descriptive() {
        let config = GenerationConfig {
            api_key_env: "DOCCHAT_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        let err = api_key(&config).unwrap_err();
        assert!(err.to_string().contains("DOCCHAT_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
