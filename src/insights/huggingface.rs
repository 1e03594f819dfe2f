use crate::insights::TextGenerator;
use anyhow::{anyhow, bail};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const INFERENCE_ENDPOINT: &str = "https://api-inference.huggingface.co/models";

// model cold starts are slow on the free tier
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HuggingFaceGenerator {
    api_token: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl HuggingFaceGenerator {
    pub fn new(api_token: String, model: String) -> Self {
        Self {
            api_token,
            model,
            client: reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builds"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SummaryItem {
    summary_text: String,
}

impl TextGenerator for HuggingFaceGenerator {
    fn name(&self) -> String {
        format!("huggingface/{}", self.model)
    }

    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!("{INFERENCE_ENDPOINT}/{}", self.model))
            .bearer_auth(&self.api_token)
            .json(&json!({
                "inputs": prompt,
                "parameters": { "do_sample": false },
                "options": { "wait_for_model": true },
            }))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            bail!("hugging face inference returned {status}");
        }

        let items: Vec<SummaryItem> = resp.json()?;
        let text = items
            .into_iter()
            .next()
            .map(|item| item.summary_text)
            .ok_or_else(|| anyhow!("hugging face inference returned an empty result"))?;

        if text.trim().is_empty() {
            bail!("hugging face inference returned blank text");
        }

        Ok(text)
    }
}
