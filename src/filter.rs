use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{JobRecord, JobType, RoleCategory};

/// Enforces the hard eligibility rules. Every record, including ones
/// about to be rejected, is first enriched with a role category and job
/// type so rejection reasons can reference derived fields.
pub struct Filter<'a> {
    config: &'a Config,
    cutoff: DateTime<Utc>,
}

impl<'a> Filter<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self::with_now(config, Utc::now())
    }

    /// Pin the clock, for deterministic tests.
    pub fn with_now(config: &'a Config, now: DateTime<Utc>) -> Self {
        Self {
            config,
            cutoff: now - Duration::hours(config.max_job_age_hours),
        }
    }

    pub fn filter(&self, jobs: Vec<JobRecord>) -> Vec<JobRecord> {
        let total = jobs.len();
        let mut passed = Vec::with_capacity(total);
        let mut removed = 0usize;

        for mut job in jobs {
            self.enrich(&mut job);
            match self.reject_reason(&job) {
                Some(reason) => {
                    debug!(
                        "Filtered '{}' @ {}: {}",
                        job.title,
                        job.company.as_deref().unwrap_or("?"),
                        reason
                    );
                    removed += 1;
                }
                None => passed.push(job),
            }
        }

        info!("Filter: {} -> {} jobs ({} removed)", total, passed.len(), removed);
        passed
    }

    fn enrich(&self, job: &mut JobRecord) {
        job.role_category = Some(self.assign_role_category(&job.title));
        job.job_type = Some(detect_job_type(job));
    }

    fn assign_role_category(&self, title: &str) -> RoleCategory {
        let title_lower = title.to_lowercase();
        for rule in &self.config.roles {
            if rule.titles.iter().any(|t| title_lower.contains(&t.to_lowercase())) {
                return rule.category;
            }
        }
        // Coarse keyword families when no taxonomy entry matched.
        if ["data engineer", "etl", "pipeline"].iter().any(|kw| title_lower.contains(kw)) {
            return RoleCategory::DataEngineer;
        }
        if ["ai engineer", "artificial intelligence"].iter().any(|kw| title_lower.contains(kw)) {
            return RoleCategory::AiEngineer;
        }
        if ["machine learning", "ml engineer", "mlops"].iter().any(|kw| title_lower.contains(kw)) {
            return RoleCategory::MlEngineer;
        }
        if title_lower.contains("data scientist") {
            return RoleCategory::DataScientist;
        }
        RoleCategory::DataEngineer
    }

    /// Rules are checked in a fixed order and the first hit wins. Unknown
    /// salary, age, or applicant count never rejects; only explicit
    /// disqualifying values do.
    fn reject_reason(&self, job: &JobRecord) -> Option<String> {
        if let Some(salary) = job.salary {
            if salary < self.config.min_salary {
                return Some(format!("salary {} < {}", salary, self.config.min_salary));
            }
        }

        let combined = format!(
            "{} {}",
            job.title,
            job.description.as_deref().unwrap_or("")
        )
        .to_lowercase();
        for kw in &self.config.exclude_keywords {
            if combined.contains(&kw.to_lowercase()) {
                return Some(format!("excluded keyword: {}", kw));
            }
        }

        if let Some(posted) = job.posted_date {
            if posted < self.cutoff {
                return Some(format!("too old: {}", posted.to_rfc3339()));
            }
        }

        if let Some(applicants) = job.applicants {
            if applicants > self.config.max_applicants {
                return Some(format!("too many applicants: {}", applicants));
            }
        }

        if self.config.easy_apply_only && job.easy_apply == Some(false) {
            return Some("easy_apply_only mode".to_string());
        }

        None
    }
}

/// Prefer an explicit normalized value from the source; otherwise scan
/// title+description for type phrases; default full-time.
fn detect_job_type(job: &JobRecord) -> JobType {
    if let Some(explicit) = job.job_type {
        return explicit;
    }

    let text = format!(
        "{} {}",
        job.title,
        job.description.as_deref().unwrap_or("")
    )
    .to_lowercase();

    if text.contains("contract to hire") || text.contains("contract-to-hire") || text.contains("c2h") {
        return JobType::ContractToHire;
    }
    if ["contract", "contractor", "1099", "corp to corp", "c2c"]
        .iter()
        .any(|kw| text.contains(kw))
    {
        return JobType::Contract;
    }
    if text.contains("part time") || text.contains("part-time") {
        return JobType::PartTime;
    }
    JobType::FullTime
}
