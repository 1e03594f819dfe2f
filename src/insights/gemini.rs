use crate::insights::TextGenerator;
use anyhow::{anyhow, bail};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const GENERATE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GeminiGenerator {
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builds"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl TextGenerator for GeminiGenerator {
    fn name(&self) -> String {
        format!("google/{}", self.model)
    }

    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!(
                "{GENERATE_ENDPOINT}/{}:generateContent",
                self.model
            ))
            .query(&[("key", &self.api_key)])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
            }))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            bail!("gemini generateContent returned {status}");
        }

        let body: GenerateResponse = resp.json()?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| anyhow!("gemini generateContent returned no text"))?;

        if text.trim().is_empty() {
            bail!("gemini generateContent returned blank text");
        }

        Ok(text)
    }
}
