//! Short commercial descriptions from a local Ollama model.
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("ollama request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ollama returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("ollama returned an empty description")]
    Empty,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

pub fn build_prompt(name: &str, category: &str) -> String {
    format!(
        "Escribe una descripción comercial muy breve (máximo 20 palabras) para este \
         producto de repostería: {name}. Categoría: {category}. No uses introducciones \
         como 'Aquí tienes' o 'Este producto'."
    )
}

pub struct DescriptionGenerator {
    http: Client,
    base_url: String,
    model: String,
}

impl DescriptionGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent("catalog-pipeline/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn describe(&self, name: &str, category: &str) -> Result<String, DescribeError> {
        let prompt = build_prompt(name, category);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            stream: false,
        };
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DescribeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ChatResponse = resp.json().await?;
        let text = extract_content(parsed).ok_or(DescribeError::Empty)?;
        debug!(chars = text.chars().count(), "description generated");
        Ok(text)
    }
}

fn extract_content(resp: ChatResponse) -> Option<String> {
    let text = resp.message?.content.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_product_and_category() {
        let p = build_prompt("Betún de vainilla", "Cremas");
        assert!(p.contains("producto de repostería: Betún de vainilla."));
        assert!(p.contains("Categoría: Cremas."));
        assert!(p.contains("máximo 20 palabras"));
    }

    #[test]
    fn empty_or_missing_content_is_none() {
        let ok: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"  Suave y cremoso. "}}"#)
                .unwrap();
        assert_eq!(extract_content(ok).as_deref(), Some("Suave y cremoso."));

        let blank: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"   "}}"#).unwrap();
        assert!(extract_content(blank).is_none());

        let missing: ChatResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(extract_content(missing).is_none());
    }

    #[test]
    fn base_url_is_normalized() {
        let g = DescriptionGenerator::new("http://localhost:11434/", DEFAULT_MODEL, Duration::from_secs(5))
            .unwrap();
        assert_eq!(g.base_url, "http://localhost:11434");
        assert_eq!(g.model(), "llama3.2");
    }
}
