use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Adapters truncate free-text descriptions to keep records bounded.
pub const MAX_DESCRIPTION_LEN: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    Contract,
    ContractToHire,
    PartTime,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full_time",
            JobType::Contract => "contract",
            JobType::ContractToHire => "contract_to_hire",
            JobType::PartTime => "part_time",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "full_time" => Some(JobType::FullTime),
            "contract" => Some(JobType::Contract),
            "contract_to_hire" => Some(JobType::ContractToHire),
            "part_time" => Some(JobType::PartTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    DataEngineer,
    AiEngineer,
    MlEngineer,
    NlpEngineer,
    CvEngineer,
    DataScientist,
}

impl RoleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleCategory::DataEngineer => "data_engineer",
            RoleCategory::AiEngineer => "ai_engineer",
            RoleCategory::MlEngineer => "ml_engineer",
            RoleCategory::NlpEngineer => "nlp_engineer",
            RoleCategory::CvEngineer => "cv_engineer",
            RoleCategory::DataScientist => "data_scientist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "data_engineer" => Some(RoleCategory::DataEngineer),
            "ai_engineer" => Some(RoleCategory::AiEngineer),
            "ml_engineer" => Some(RoleCategory::MlEngineer),
            "nlp_engineer" => Some(RoleCategory::NlpEngineer),
            "cv_engineer" => Some(RoleCategory::CvEngineer),
            "data_scientist" => Some(RoleCategory::DataScientist),
            _ => None,
        }
    }
}

/// One job posting as it flows through the pipeline.
///
/// Created by a source adapter, merged by the deduplicator, enriched and
/// possibly rejected by the filter, scored by the scorer, then handed to
/// storage and notification. Only `title` is guaranteed present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Annualized USD estimate.
    pub salary: Option<i64>,
    /// Canonical listing link; natural key for persistence.
    pub url: Option<String>,
    pub source: String,
    pub posted_date: Option<DateTime<Utc>>,
    /// Tri-state: Some(true)/Some(false) when the source says, None when unknown.
    pub easy_apply: Option<bool>,
    pub applicants: Option<i64>,
    pub description: Option<String>,
    pub job_type: Option<JobType>,
    pub role_category: Option<RoleCategory>,
    /// Heuristic relevance, 0..=100, assigned by the scorer.
    pub score: u8,
    pub llm_score: Option<u8>,
    pub llm_reason: Option<String>,
    pub llm_summary: Option<String>,
    pub skills: Vec<String>,
}

impl JobRecord {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: None,
            location: None,
            salary: None,
            url: None,
            source: source.into(),
            posted_date: None,
            easy_apply: None,
            applicants: None,
            description: None,
            job_type: None,
            role_category: None,
            score: 0,
            llm_score: None,
            llm_reason: None,
            llm_summary: None,
            skills: Vec::new(),
        }
    }
}

/// A persisted job row. The pipeline never touches the storage-owned
/// flags (notified/applied/saved); they belong to the database layer.
#[derive(Debug, Clone)]
pub struct StoredJob {
    pub id: i64,
    pub record: JobRecord,
    pub scraped_at: String,
    pub notified: bool,
    pub applied: bool,
    pub saved: bool,
}
