use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{clean_description, polite_delay, JobSource, USER_AGENT};
use crate::config::Config;
use crate::models::JobRecord;

const API_TAGS: &[&str] = &["data-engineer", "etl"];

/// RemoteOK public REST API, no auth required.
/// Endpoint: https://remoteok.com/api?tags=<tag>
pub struct RemoteOkSource {
    client: reqwest::blocking::Client,
    delay_ms: (u64, u64),
}

impl RemoteOkSource {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            delay_ms: (config.request_delay_min_ms, config.request_delay_max_ms),
        }
    }

    fn fetch_tag(&self, tag: &str) -> Result<Vec<JobRecord>> {
        let url = format!("https://remoteok.com/api?tags={}", tag);
        let data: Vec<Value> = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("RemoteOK GET {} failed", url))?
            .json()
            .context("RemoteOK returned non-JSON body")?;

        // The first array element is a legal-notice stub, not a job.
        Ok(data.iter().skip(1).filter_map(parse_item).collect())
    }
}

impl JobSource for RemoteOkSource {
    fn name(&self) -> &str {
        "RemoteOK"
    }

    fn scrape(&self) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for tag in API_TAGS {
            match self.fetch_tag(tag) {
                Ok(batch) => {
                    for job in batch {
                        match &job.url {
                            Some(url) if !seen_urls.insert(url.clone()) => {
                                debug!("RemoteOK: duplicate url {}", url);
                            }
                            _ => jobs.push(job),
                        }
                    }
                }
                Err(e) => warn!("RemoteOK tag '{}' failed: {}", tag, e),
            }
            polite_delay(self.delay_ms.0, self.delay_ms.1);
        }

        info!("RemoteOK: collected {} jobs", jobs.len());
        Ok(jobs)
    }
}

fn parse_item(item: &Value) -> Option<JobRecord> {
    let title = item.get("position")?.as_str()?.trim();
    if title.is_empty() {
        return None;
    }

    let mut job = JobRecord::new(title, "RemoteOK");
    job.company = item
        .get("company")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    job.location = item
        .get("location")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| Some("Remote".to_string()));

    let salary_min = item
        .get("salary_min")
        .or_else(|| item.get("annual_salary_min"))
        .and_then(Value::as_i64)
        .filter(|v| *v > 0);
    let salary_max = item
        .get("salary_max")
        .or_else(|| item.get("annual_salary_max"))
        .and_then(Value::as_i64)
        .filter(|v| *v > 0);
    job.salary = match (salary_min, salary_max) {
        (Some(lo), Some(hi)) => Some((lo + hi) / 2),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    job.url = item
        .get("url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            item.get("id")
                .and_then(Value::as_str)
                .map(|id| format!("https://remoteok.com/l/{}", id))
        });

    job.posted_date = item
        .get("epoch")
        .and_then(Value::as_i64)
        .and_then(|e| DateTime::<Utc>::from_timestamp(e, 0))
        .or_else(|| Some(Utc::now()));

    // RemoteOK postings are direct-apply.
    job.easy_apply = Some(true);
    job.applicants = item.get("applicants").and_then(Value::as_i64);

    let tags = item
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    job.description = clean_description(&tags);

    Some(job)
}
