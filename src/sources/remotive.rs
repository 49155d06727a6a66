use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

use super::{clean_description, parse_salary, polite_delay, JobSource, USER_AGENT};
use crate::config::Config;
use crate::models::JobRecord;

const API_URL: &str = "https://remotive.com/api/remote-jobs";
const CATEGORIES: &[&str] = &["software-dev", "data", "devops-sysadmin"];

/// Remotive free public API for remote tech jobs.
pub struct RemotiveSource {
    client: reqwest::blocking::Client,
    delay_ms: (u64, u64),
}

impl RemotiveSource {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            delay_ms: (config.request_delay_min_ms, config.request_delay_max_ms),
        }
    }

    fn fetch_category(&self, category: &str) -> Result<Vec<JobRecord>> {
        let body: Value = self
            .client
            .get(API_URL)
            .query(&[("category", category), ("limit", "100")])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Remotive category '{}' failed", category))?
            .json()
            .context("Remotive returned non-JSON body")?;

        let jobs = body
            .get("jobs")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(parse_item).collect())
            .unwrap_or_default();
        Ok(jobs)
    }
}

impl JobSource for RemotiveSource {
    fn name(&self) -> &str {
        "Remotive"
    }

    fn scrape(&self) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for category in CATEGORIES {
            match self.fetch_category(category) {
                Ok(batch) => {
                    for job in batch {
                        match &job.url {
                            Some(url) if !seen_urls.insert(url.clone()) => {}
                            _ => jobs.push(job),
                        }
                    }
                }
                Err(e) => warn!("Remotive category '{}': {}", category, e),
            }
            polite_delay(self.delay_ms.0, self.delay_ms.1);
        }

        info!("Remotive: collected {} jobs", jobs.len());
        Ok(jobs)
    }
}

fn parse_item(item: &Value) -> Option<JobRecord> {
    let title = item.get("title")?.as_str()?.trim();
    if title.is_empty() {
        return None;
    }

    let mut job = JobRecord::new(title, "Remotive");
    job.company = item
        .get("company_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    job.location = item
        .get("candidate_required_location")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| Some("Remote".to_string()));
    job.salary = item
        .get("salary")
        .and_then(Value::as_str)
        .and_then(parse_salary);
    job.url = item
        .get("url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    job.posted_date = item
        .get("publication_date")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(&format!("{}Z", s.trim_end_matches('Z'))).ok())
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| Some(Utc::now()));
    job.easy_apply = Some(true);
    job.description = item
        .get("description")
        .and_then(Value::as_str)
        .and_then(clean_description);

    Some(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_item_full() {
        let item = json!({
            "title": "ETL Engineer",
            "company_name": "Beta Corp",
            "candidate_required_location": "USA Only",
            "salary": "$110,000 - $130,000",
            "url": "https://remotive.com/remote-jobs/data/etl-1",
            "publication_date": "2025-08-20T10:00:00",
            "description": "Airflow  and   dbt pipelines"
        });
        let job = parse_item(&item).unwrap();
        assert_eq!(job.title, "ETL Engineer");
        assert_eq!(job.company.as_deref(), Some("Beta Corp"));
        assert_eq!(job.salary, Some(120_000));
        assert_eq!(job.description.as_deref(), Some("Airflow and dbt pipelines"));
        assert!(job.posted_date.is_some());
    }

    #[test]
    fn test_parse_item_missing_title_dropped() {
        assert!(parse_item(&json!({"company_name": "Beta"})).is_none());
    }

    #[test]
    fn test_parse_item_bad_date_defaults_to_now() {
        let item = json!({"title": "DE", "publication_date": "not a date"});
        let job = parse_item(&item).unwrap();
        assert!(job.posted_date.is_some());
    }
}
