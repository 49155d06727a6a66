use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LlmSettings;
use crate::models::JobRecord;

/// Optional enrichment capability backed by an OpenAI-compatible NVIDIA
/// NIM endpoint. Absence of a key makes every call report "unavailable"
/// rather than error; the pipeline treats that as "no enrichment", never
/// as a failure.
pub struct LlmClient {
    settings: LlmSettings,
    client: reqwest::blocking::Client,
}

/// One job's LLM verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInsight {
    pub score: u8,
    pub reason: String,
    pub summary: String,
    pub skills: Vec<String>,
}

// --- Wire types (OpenAI-compatible) ---

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
    encoding_format: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    score: i64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    skills: Vec<String>,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            settings,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// A client that always reports unavailable, for `--no-llm` runs and
    /// tests.
    pub fn disabled() -> Self {
        Self::new(LlmSettings::default())
    }

    pub fn available(&self) -> bool {
        self.settings.api_key.is_some()
    }

    fn chat(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("LLM capability not configured"))?;

        let request = ChatRequest {
            model: self.settings.chat_model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.1,
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .context("Failed to send chat request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("Chat request failed with status {}: {}", status, body));
        }

        let parsed: ChatResponse = response.json().context("Failed to parse chat response")?;
        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("No choices in chat response"))
    }

    /// Embed a text, or None if the capability is unavailable or errored
    /// for this item.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let api_key = self.settings.api_key.as_ref()?;

        let request = EmbeddingRequest {
            model: self.settings.embed_model.clone(),
            input: text.to_string(),
            encoding_format: "float".to_string(),
        };

        let result = self
            .client
            .post(format!("{}/embeddings", self.settings.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<EmbeddingResponse>());

        match result {
            Ok(parsed) => parsed.data.into_iter().next().map(|d| d.embedding),
            Err(e) => {
                debug!("Embedding failed: {}", e);
                None
            }
        }
    }

    /// Ask the model to judge one record. Any failure is "unavailable for
    /// this item".
    pub fn score_job(&self, job: &JobRecord) -> Option<JobInsight> {
        if !self.available() {
            return None;
        }

        let desc: String = job
            .description
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(800)
            .collect();
        let salary = job
            .salary
            .map(|s| s.to_string())
            .unwrap_or_else(|| "not listed".to_string());
        let prompt = format!(
            "You are a job relevance evaluator for a Data Engineer / AI Engineer job seeker.\n\n\
             JOB:\n\
             Title: {}\n\
             Company: {}\n\
             Location: {}\n\
             Type: {}\n\
             Salary: {}\n\
             Description: {}\n\n\
             Respond ONLY with valid JSON (no markdown):\n\
             {{\n\
               \"score\": <integer 0-100 relevance score>,\n\
               \"reason\": \"<one sentence why>\",\n\
               \"summary\": \"<2-sentence plain-English summary of the role>\",\n\
               \"skills\": [\"skill1\", \"skill2\", \"skill3\"]\n\
             }}\n\n\
             Score guide:\n\
             90-100: Perfect match (data/AI engineering, great comp, modern stack)\n\
             70-89: Strong match\n\
             50-69: Good match\n\
             30-49: Partial match\n\
             0-29: Poor match or unrelated",
            job.title,
            job.company.as_deref().unwrap_or(""),
            job.location.as_deref().unwrap_or(""),
            job.job_type.map(|t| t.as_str()).unwrap_or(""),
            salary,
            desc
        );

        match self.chat(&prompt, 300) {
            Ok(raw) => parse_insight(&raw),
            Err(e) => {
                debug!("LLM score failed for '{}': {}", job.title, e);
                None
            }
        }
    }

    /// Enrich up to `max_jobs` records in place. Returns how many were
    /// enriched; the rest keep their llm_* fields unset.
    pub fn enrich_batch(&self, jobs: &mut [JobRecord], max_jobs: usize) -> usize {
        if !self.available() {
            return 0;
        }
        let mut enriched = 0usize;
        for job in jobs.iter_mut() {
            if enriched >= max_jobs {
                break;
            }
            if let Some(insight) = self.score_job(job) {
                job.llm_score = Some(insight.score);
                job.llm_reason = Some(insight.reason);
                job.llm_summary = Some(insight.summary);
                job.skills = insight.skills;
                enriched += 1;
            }
        }
        info!("LLM: enriched {}/{} jobs", enriched, jobs.len());
        enriched
    }
}

/// Parse the model's JSON verdict, tolerating markdown code fences.
pub fn parse_insight(raw: &str) -> Option<JobInsight> {
    let trimmed = strip_code_fences(raw.trim());
    let parsed: RawInsight = serde_json::from_str(trimmed).ok()?;
    Some(JobInsight {
        score: parsed.score.clamp(0, 100) as u8,
        reason: parsed.reason,
        summary: parsed.summary,
        skills: parsed.skills,
    })
}

fn strip_code_fences(text: &str) -> &str {
    let mut t = text;
    if let Some(rest) = t.strip_prefix("```") {
        // Drop the fence line itself ("```json" etc).
        t = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
