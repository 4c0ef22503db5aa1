//! Ollama-backed LLM extraction adapter.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use invox_core::llm::schema;
use invox_core::{ExtractedFields, LivenessTracker, LlmError, LlmExtractionAdapter};

/// HTTP client for a local Ollama instance.
pub struct OllamaLlmAdapter {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    liveness: LivenessTracker,
}

impl OllamaLlmAdapter {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
            liveness: LivenessTracker::default(),
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Unavailable(format!("cannot reach {}", self.base_url))
        } else if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::Unavailable(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LlmExtractionAdapter for OllamaLlmAdapter {
    fn is_available(&self) -> bool {
        if !self.liveness.is_live() {
            debug!("Ollama adapter in failure cooldown, skipping");
            return false;
        }
        // Cheap reachability probe against the model list endpoint.
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send() {
            Ok(resp) => resp.status().is_success(),
            Err(_) => {
                self.liveness.record_failure();
                false
            }
        }
    }

    fn extract_invoice_data(&self, ocr_text: &str) -> Result<ExtractedFields, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: schema::build_prompt(ocr_text),
            system: schema::SYSTEM_PROMPT,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: schema::TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                self.liveness.record_failure();
                self.map_send_error(e)
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Unavailable(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        let fields = schema::parse_response(&parsed.response)?;
        self.liveness.record_success();
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_trailing_slash() {
        let adapter = OllamaLlmAdapter::new("http://localhost:11434/", "llama3", 30).unwrap();
        assert_eq!(adapter.base_url, "http://localhost:11434");
    }
}
