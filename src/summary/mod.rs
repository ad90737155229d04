//! Whole-video summary generation from per-scene analyses.

use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::session::Scene;

#[derive(Clone)]
pub struct SummaryClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

impl SummaryClient {
    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60)) // generation can be slow
                .build()
                .unwrap_or_default(),
            base_url,
            model,
            api_key,
        }
    }

    /// Ask the model to condense the per-scene digest into one narrative.
    pub async fn summarize(&self, digest: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the overall flow of the video from these per-scene analyses:\n\n{digest}"
        );
        let request_body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self.client.post(url).json(&request_body).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("summary endpoint error: {}", response.status()));
        }

        let resp_json: GenerateResponse = response.json().await?;
        resp_json
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| anyhow!("summary response contained no text"))
    }
}

/// One line per analyzed scene: ordinal, time span, description.
pub fn compose_digest(scenes: &[Scene]) -> String {
    scenes
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_analyzed)
        .map(|(i, s)| {
            format!(
                "Scene {} ({} - {}): {}",
                i + 1,
                format_time(s.start_time),
                format_time(s.end_time),
                s.description.as_deref().unwrap_or("no description")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_time(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor() as u64;
    let remaining = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_covers_only_analyzed_scenes() {
        let mut a = Scene::new(Vec::new(), 0.0, 65.0);
        a.description = Some("opening shot".into());
        a.is_analyzed = true;
        let b = Scene::new(Vec::new(), 65.0, 80.0);

        let digest = compose_digest(&[a, b]);
        assert_eq!(digest, "Scene 1 (0:00 - 1:05): opening shot");
    }
}
