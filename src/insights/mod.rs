pub mod gemini;
pub mod huggingface;

use crate::config::{InsightConfig, Secrets};
use crate::podcasts::{InsightKind, Podcast};

/// A generative-text backend. One implementation per provider.
pub trait TextGenerator: Send + Sync {
    /// Provider/model label stored on the produced insight
    fn name(&self) -> String;

    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Providers in preference order; generation tries each until one succeeds.
pub struct InsightRegistry {
    generators: Vec<Box<dyn TextGenerator>>,
}

impl InsightRegistry {
    pub fn from_secrets(secrets: &Secrets, config: &InsightConfig) -> Self {
        let mut generators: Vec<Box<dyn TextGenerator>> = Vec::new();

        if let Some(key) = &secrets.gemini_api_key {
            generators.push(Box::new(gemini::GeminiGenerator::new(
                key.clone(),
                config.gemini_model.clone(),
            )));
        }

        if let Some(token) = &secrets.hf_api_token {
            generators.push(Box::new(huggingface::HuggingFaceGenerator::new(
                token.clone(),
                config.hf_model.clone(),
            )));
        }

        if generators.is_empty() {
            log::warn!(
                "no insight provider configured (GEMINI_API_KEY / HF_API_TOKEN); \
                 insight generation will fail"
            );
        }

        Self { generators }
    }

    /// Used by tests to substitute a canned generator.
    pub fn with_generators(generators: Vec<Box<dyn TextGenerator>>) -> Self {
        Self { generators }
    }

    /// First provider to answer wins; failures are logged and the next one
    /// is tried.
    pub fn generate(&self, prompt: &str) -> anyhow::Result<(String, String)> {
        if self.generators.is_empty() {
            anyhow::bail!("no insight provider configured");
        }

        let mut last_err = None;
        for generator in &self.generators {
            match generator.generate(prompt) {
                Ok(text) => return Ok((generator.name(), text)),
                Err(err) => {
                    log::warn!("insight provider {} failed: {err:?}", generator.name());
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.expect("at least one generator attempted"))
    }
}

/// Renders the record's numbers into a prompt for the text providers.
pub fn build_prompt(podcast: &Podcast, kind: InsightKind, max_words: u32) -> String {
    let mut facts = vec![
        format!("Title: {}", podcast.title),
        format!("Platform: {}", podcast.platform),
        format!("Author: {}", podcast.author),
        format!(
            "Stats: {} views/plays, {} likes, {} comments, {} subscribers, {} episodes",
            podcast.stats.views,
            podcast.stats.likes,
            podcast.stats.comments,
            podcast.stats.subscribers,
            podcast.stats.episode_count
        ),
        format!("Total downloads across episodes: {}", podcast.total_downloads),
    ];

    match kind {
        InsightKind::Summary => {
            if !podcast.description.is_empty() {
                facts.push(format!("Description: {}", podcast.description));
            }
        }
        InsightKind::Growth => {
            for episode in podcast.episodes.iter().take(10) {
                facts.push(format!(
                    "Episode \"{}\": {} downloads, {} plays, {} likes",
                    episode.title, episode.downloads, episode.plays, episode.likes
                ));
            }
        }
        InsightKind::Audience => {
            for bucket in &podcast.audience.age_buckets {
                facts.push(format!("Age {}: {:.1}%", bucket.label, bucket.percent));
            }
            for share in &podcast.audience.top_countries {
                facts.push(format!("Country {}: {:.1}%", share.country, share.percent));
            }
            let g = &podcast.audience.gender;
            facts.push(format!(
                "Gender split: {:.1}% male, {:.1}% female, {:.1}% other",
                g.male, g.female, g.other
            ));
        }
        InsightKind::Monetization => {
            let m = &podcast.monetization;
            facts.push(format!(
                "Monetization: {} cents monthly revenue, {} cents CPM, {} sponsors, {} premium subscribers",
                m.monthly_revenue_cents, m.cpm_cents, m.sponsor_count, m.premium_subscribers
            ));
        }
    }

    let instruction = match kind {
        InsightKind::Summary => "Write a concise summary of this podcast and its performance",
        InsightKind::Growth => "Analyze growth trends and suggest what is driving them",
        InsightKind::Audience => "Describe the audience and what content would serve it",
        InsightKind::Monetization => "Assess monetization performance and opportunities",
    };

    format!(
        "{instruction} in at most {max_words} words.\n\n{}",
        facts.join("\n")
    )
}
