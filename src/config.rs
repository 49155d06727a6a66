use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::models::RoleCategory;

/// All pipeline settings, constructed once at startup and passed by
/// reference into every stage. Never consulted as ambient global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Search titles, fanned out to the source adapters.
    pub job_titles: Vec<String>,
    /// Hard salary floor in annual USD; records with a known salary
    /// below this are rejected.
    pub min_salary: i64,
    /// Keywords that earn scoring points when found in a description.
    pub include_keywords: Vec<String>,
    /// Keywords that disqualify a record when found in title+description.
    pub exclude_keywords: Vec<String>,
    /// Employers that receive a scoring bonus.
    pub dream_companies: Vec<String>,
    pub max_job_age_hours: i64,
    pub max_applicants: i64,
    pub easy_apply_only: bool,
    /// Minimum score for a record to be notified about.
    pub alert_score_threshold: u8,
    /// Concurrent source-adapter fetches.
    pub max_workers: usize,
    /// Upper bound on records submitted for LLM enrichment per run.
    pub llm_max_jobs: usize,
    /// Semantic dedup is skipped above this record count (it is O(n^2)).
    pub semantic_dedup_ceiling: usize,
    pub request_delay_min_ms: u64,
    pub request_delay_max_ms: u64,
    pub db_path: Option<PathBuf>,
    /// Role taxonomy, checked in order; first matching category wins.
    pub roles: Vec<RoleRule>,
    /// Selector-driven HTML board adapters.
    pub boards: Vec<BoardSpec>,

    #[serde(skip)]
    pub llm: LlmSettings,
    #[serde(skip)]
    pub telegram: TelegramSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleRule {
    pub category: RoleCategory,
    pub titles: Vec<String>,
}

/// One CSS-selector-driven job board. Selector lists are tried in order;
/// the first that matches wins, so a spec can survive minor site redesigns.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardSpec {
    pub name: String,
    /// Search URL with a `{query}` placeholder.
    pub search_url: String,
    /// Prefix for relative hrefs.
    #[serde(default)]
    pub base_url: String,
    pub card_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    #[serde(default)]
    pub company_selectors: Vec<String>,
    #[serde(default)]
    pub location_selectors: Vec<String>,
    #[serde(default)]
    pub salary_selectors: Vec<String>,
    #[serde(default)]
    pub link_selectors: Vec<String>,
    #[serde(default)]
    pub posted_selectors: Vec<String>,
    /// Job type assumed when the card does not state one.
    #[serde(default)]
    pub default_job_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
}

#[derive(Debug, Clone, Default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job_titles: vec![
                "Data Engineer".to_string(),
                "Data Engineering".to_string(),
                "ETL Engineer".to_string(),
                "Pipeline Engineer".to_string(),
            ],
            min_salary: 80_000,
            include_keywords: [
                "data pipeline",
                "ETL",
                "Spark",
                "Kafka",
                "Airflow",
                "dbt",
                "SQL",
                "Python",
                "cloud",
                "AWS",
                "GCP",
                "Azure",
                "data warehouse",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_keywords: [
                "unpaid",
                "10+ years",
                "principal",
                "staff engineer",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            dream_companies: [
                "Google", "Amazon", "AWS", "Microsoft", "Azure", "Meta", "Facebook",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_job_age_hours: 72,
            max_applicants: 100,
            easy_apply_only: false,
            alert_score_threshold: 65,
            max_workers: 10,
            llm_max_jobs: 150,
            semantic_dedup_ceiling: 500,
            request_delay_min_ms: 2_000,
            request_delay_max_ms: 5_000,
            db_path: None,
            roles: default_roles(),
            boards: default_boards(),
            llm: LlmSettings::default(),
            telegram: TelegramSettings::default(),
        }
    }
}

fn default_roles() -> Vec<RoleRule> {
    fn rule(category: RoleCategory, titles: &[&str]) -> RoleRule {
        RoleRule {
            category,
            titles: titles.iter().map(|s| s.to_string()).collect(),
        }
    }
    vec![
        rule(
            RoleCategory::DataEngineer,
            &["data engineer", "data engineering", "etl engineer", "pipeline engineer", "analytics engineer"],
        ),
        rule(
            RoleCategory::AiEngineer,
            &["ai engineer", "artificial intelligence engineer", "genai engineer", "llm engineer"],
        ),
        rule(
            RoleCategory::MlEngineer,
            &["machine learning engineer", "ml engineer", "mlops engineer"],
        ),
        rule(RoleCategory::NlpEngineer, &["nlp engineer", "natural language"]),
        rule(RoleCategory::CvEngineer, &["computer vision", "cv engineer"]),
        rule(RoleCategory::DataScientist, &["data scientist", "data science"]),
    ]
}

fn default_boards() -> Vec<BoardSpec> {
    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
    vec![
        BoardSpec {
            name: "TEKsystems".to_string(),
            search_url: "https://www.teksystems.com/en/jobs#q={query}&t=Jobs&sort=relevancy".to_string(),
            base_url: "https://www.teksystems.com".to_string(),
            card_selectors: strings(&["div.job-card", "li.job-listing", "article.job"]),
            title_selectors: strings(&["h2 a", "h3 a", ".job-title a", "a.title"]),
            company_selectors: strings(&[".company", ".employer", ".client"]),
            location_selectors: strings(&[".location", ".city-state", ".job-location"]),
            salary_selectors: strings(&[".salary", ".rate", ".compensation"]),
            link_selectors: strings(&["h2 a", "h3 a", ".job-title a"]),
            posted_selectors: strings(&[".date", ".posted", "time"]),
            default_job_type: Some("contract".to_string()),
        },
        BoardSpec {
            name: "CyberCoders".to_string(),
            search_url: "https://www.cybercoders.com/jobs/?searchterms={query}".to_string(),
            base_url: "https://www.cybercoders.com".to_string(),
            card_selectors: strings(&["div.job-listing-item", "div.job-result", "article.job"]),
            title_selectors: strings(&[".job-title a", "h2 a", "a.job-link"]),
            company_selectors: strings(&[".company", ".employer"]),
            location_selectors: strings(&[".location", ".job-location"]),
            salary_selectors: strings(&[".wage", ".salary", ".compensation"]),
            link_selectors: strings(&[".job-title a", "h2 a"]),
            posted_selectors: strings(&[".posted", ".date", "time"]),
            default_job_type: Some("full_time".to_string()),
        },
    ]
}

impl Config {
    /// Load settings: built-in defaults, overridden by an optional TOML
    /// file, with credentials pulled from the environment. Any malformed
    /// value is fatal here rather than handled per-record later.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                toml::from_str::<Config>(&text)
                    .with_context(|| format!("Malformed config file: {}", p.display()))?
            }
            None => Config::default(),
        };

        config.llm = LlmSettings {
            api_key: env::var("NVIDIA_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: env::var("NVIDIA_BASE_URL")
                .unwrap_or_else(|_| "https://integrate.api.nvidia.com/v1".to_string()),
            chat_model: env::var("NVIDIA_CHAT_MODEL")
                .unwrap_or_else(|_| "nvidia/llama-3.1-8b-instruct".to_string()),
            embed_model: env::var("NVIDIA_EMBED_MODEL")
                .unwrap_or_else(|_| "nvidia/nv-embedqa-e5-v5".to_string()),
        };
        config.telegram = TelegramSettings {
            bot_token: env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            chat_id: env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.min_salary < 0 {
            bail!("min_salary must be non-negative, got {}", self.min_salary);
        }
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }
        if self.alert_score_threshold > 100 {
            bail!(
                "alert_score_threshold must be 0-100, got {}",
                self.alert_score_threshold
            );
        }
        if self.request_delay_min_ms > self.request_delay_max_ms {
            bail!(
                "request_delay_min_ms ({}) exceeds request_delay_max_ms ({})",
                self.request_delay_min_ms,
                self.request_delay_max_ms
            );
        }
        if self.max_job_age_hours <= 0 {
            bail!("max_job_age_hours must be positive, got {}", self.max_job_age_hours);
        }
        for board in &self.boards {
            if !board.search_url.contains("{query}") {
                bail!("board '{}' search_url is missing the {{query}} placeholder", board.name);
            }
            for sel in board
                .card_selectors
                .iter()
                .chain(&board.title_selectors)
                .chain(&board.company_selectors)
                .chain(&board.location_selectors)
                .chain(&board.salary_selectors)
                .chain(&board.link_selectors)
                .chain(&board.posted_selectors)
            {
                if scraper::Selector::parse(sel).is_err() {
                    bail!("board '{}' has an invalid CSS selector: {}", board.name, sel);
                }
            }
        }
        Ok(())
    }
}
