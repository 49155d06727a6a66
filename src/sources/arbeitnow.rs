use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

use super::{clean_description, polite_delay, JobSource, USER_AGENT};
use crate::config::Config;
use crate::models::{JobRecord, JobType};

const API_URL: &str = "https://www.arbeitnow.com/api/job-board-api";
const PAGES_PER_TITLE: u32 = 2;

/// Arbeitnow free public job board API, no auth, no bot detection.
pub struct ArbeitnowSource {
    client: reqwest::blocking::Client,
    titles: Vec<String>,
    delay_ms: (u64, u64),
}

impl ArbeitnowSource {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            titles: config.job_titles.iter().take(3).cloned().collect(),
            delay_ms: (config.request_delay_min_ms, config.request_delay_max_ms),
        }
    }

    fn fetch_page(&self, title: &str, page: u32) -> Result<Vec<JobRecord>> {
        let body: Value = self
            .client
            .get(API_URL)
            .query(&[("q", title), ("page", &page.to_string())])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Arbeitnow '{}' page {} failed", title, page))?
            .json()
            .context("Arbeitnow returned non-JSON body")?;

        let jobs = body
            .get("data")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(parse_item).collect())
            .unwrap_or_default();
        Ok(jobs)
    }
}

impl JobSource for ArbeitnowSource {
    fn name(&self) -> &str {
        "Arbeitnow"
    }

    fn scrape(&self) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for title in &self.titles {
            for page in 1..=PAGES_PER_TITLE {
                match self.fetch_page(title, page) {
                    Ok(batch) => {
                        if batch.is_empty() {
                            break;
                        }
                        for job in batch {
                            match &job.url {
                                Some(url) if !seen_urls.insert(url.clone()) => {}
                                _ => jobs.push(job),
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Arbeitnow '{}' failed: {}", title, e);
                        break;
                    }
                }
            }
            polite_delay(self.delay_ms.0, self.delay_ms.1);
        }

        info!("Arbeitnow: collected {} jobs", jobs.len());
        Ok(jobs)
    }
}

fn parse_item(item: &Value) -> Option<JobRecord> {
    let title = item.get("title")?.as_str()?.trim();
    if title.is_empty() {
        return None;
    }

    let mut job = JobRecord::new(title, "Arbeitnow");
    job.company = item
        .get("company_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    job.location = item
        .get("location")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if item.get("remote").and_then(Value::as_bool) == Some(true) {
        job.location = Some(match job.location.take() {
            Some(loc) if !loc.to_lowercase().contains("remote") => format!("{} (Remote)", loc),
            Some(loc) => loc,
            None => "Remote".to_string(),
        });
    }
    job.url = item
        .get("url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    job.posted_date = item
        .get("created_at")
        .and_then(Value::as_i64)
        .and_then(|e| DateTime::<Utc>::from_timestamp(e, 0))
        .or_else(|| Some(Utc::now()));
    job.description = item
        .get("description")
        .and_then(Value::as_str)
        .and_then(clean_description);
    job.job_type = item
        .get("job_types")
        .and_then(Value::as_array)
        .and_then(|types| types.iter().filter_map(Value::as_str).find_map(JobType::parse));

    Some(job)
}
