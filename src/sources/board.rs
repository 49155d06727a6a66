use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{clean_description, parse_relative_date, parse_salary, polite_delay, JobSource, USER_AGENT};
use crate::config::{BoardSpec, Config};
use crate::models::{JobRecord, JobType};

/// Selector-driven adapter for staffing-agency boards that render server
/// side. One instance per configured board; everything site-specific
/// lives in the [`BoardSpec`], so adding a board is a config change.
pub struct BoardSource {
    spec: BoardSpec,
    client: reqwest::blocking::Client,
    titles: Vec<String>,
    delay_ms: (u64, u64),
}

impl BoardSource {
    pub fn new(spec: BoardSpec, config: &Config) -> Self {
        Self {
            spec,
            client: reqwest::blocking::Client::new(),
            titles: config.job_titles.iter().take(3).cloned().collect(),
            delay_ms: (config.request_delay_min_ms, config.request_delay_max_ms),
        }
    }

    fn search_url(&self, title: &str) -> String {
        let query = title.split_whitespace().collect::<Vec<_>>().join("+");
        self.spec.search_url.replace("{query}", &query)
    }

    fn fetch_query(&self, title: &str) -> Result<Vec<JobRecord>> {
        let url = self.search_url(title);
        let html = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("{} GET {} failed", self.spec.name, url))?
            .text()
            .with_context(|| format!("{} returned unreadable body", self.spec.name))?;

        Ok(self.parse_listing(&html))
    }

    fn parse_listing(&self, html: &str) -> Vec<JobRecord> {
        let doc = Html::parse_document(html);

        let cards = match first_matching_selector(&doc, &self.spec.card_selectors) {
            Some(selector) => doc.select(&selector).collect::<Vec<_>>(),
            None => {
                debug!("{}: no card selector matched", self.spec.name);
                return Vec::new();
            }
        };

        cards
            .into_iter()
            .filter_map(|card| self.parse_card(card))
            .collect()
    }

    fn parse_card(&self, card: ElementRef) -> Option<JobRecord> {
        let title = select_text(card, &self.spec.title_selectors)?;
        let mut job = JobRecord::new(&title, &self.spec.name);

        job.company = select_text(card, &self.spec.company_selectors)
            .or_else(|| Some(self.spec.name.clone()));
        job.location = select_text(card, &self.spec.location_selectors);
        job.salary = select_text(card, &self.spec.salary_selectors)
            .as_deref()
            .and_then(parse_salary);
        job.url = self.card_link(card);
        job.posted_date = Some(
            select_text(card, &self.spec.posted_selectors)
                .map(|t| parse_relative_date(&t))
                .unwrap_or_else(chrono::Utc::now),
        );

        let card_text = card.text().collect::<Vec<_>>().join(" ");
        job.job_type = detect_card_job_type(&card_text)
            .or_else(|| self.spec.default_job_type.as_deref().and_then(JobType::parse));
        job.description = clean_description(&card_text);

        Some(job)
    }

    fn card_link(&self, card: ElementRef) -> Option<String> {
        for raw in &self.spec.link_selectors {
            let Ok(selector) = Selector::parse(raw) else { continue };
            if let Some(href) = card.select(&selector).find_map(|el| el.value().attr("href")) {
                return Some(absolutize(href, &self.spec.base_url));
            }
        }
        // Some boards make the whole card the anchor.
        card.value()
            .attr("href")
            .map(|href| absolutize(href, &self.spec.base_url))
    }
}

impl JobSource for BoardSource {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn scrape(&self) -> Result<Vec<JobRecord>> {
        let mut jobs = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for title in &self.titles {
            match self.fetch_query(title) {
                Ok(batch) => {
                    for job in batch {
                        match &job.url {
                            Some(url) if !seen_urls.insert(url.clone()) => {}
                            _ => jobs.push(job),
                        }
                    }
                }
                Err(e) => warn!("{} query '{}': {}", self.spec.name, title, e),
            }
            polite_delay(self.delay_ms.0, self.delay_ms.1);
        }

        info!("{}: collected {} jobs", self.spec.name, jobs.len());
        Ok(jobs)
    }
}

/// Selectors are tried in the order configured; the first one with at
/// least one match wins for the whole document.
fn first_matching_selector(doc: &Html, raw_selectors: &[String]) -> Option<Selector> {
    for raw in raw_selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if doc.select(&selector).next().is_some() {
            return Some(selector);
        }
    }
    None
}

fn select_text(card: ElementRef, raw_selectors: &[String]) -> Option<String> {
    for raw in raw_selectors {
        let Ok(selector) = Selector::parse(raw) else { continue };
        if let Some(el) = card.select(&selector).next() {
            let text = el.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn absolutize(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    }
}

fn detect_card_job_type(text: &str) -> Option<JobType> {
    let lower = text.to_lowercase();
    if lower.contains("contract to hire") || lower.contains("c2h") {
        Some(JobType::ContractToHire)
    } else if lower.contains("contract") || lower.contains("1099") || lower.contains("c2c") {
        Some(JobType::Contract)
    } else if lower.contains("part time") || lower.contains("part-time") {
        Some(JobType::PartTime)
    } else if lower.contains("full time") || lower.contains("full-time") || lower.contains("permanent")
    {
        Some(JobType::FullTime)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoardSpec, Config};

    fn sample_spec() -> BoardSpec {
        BoardSpec {
            name: "TestBoard".to_string(),
            search_url: "https://jobs.example.com/search?q={query}".to_string(),
            base_url: "https://jobs.example.com".to_string(),
            card_selectors: vec!["div.job-card".to_string(), "li.posting".to_string()],
            title_selectors: vec!["h2.title".to_string()],
            company_selectors: vec!["span.company".to_string()],
            location_selectors: vec!["span.loc".to_string()],
            salary_selectors: vec!["span.pay".to_string()],
            link_selectors: vec!["a.apply".to_string()],
            posted_selectors: vec!["time.ago".to_string()],
            default_job_type: Some("contract".to_string()),
        }
    }

    fn sample_source() -> BoardSource {
        BoardSource::new(sample_spec(), &Config::default())
    }

    const LISTING: &str = r#"
        <html><body>
          <div class="job-card">
            <h2 class="title">Data  Engineer</h2>
            <span class="company">Staffing Inc</span>
            <span class="loc">Austin, TX (Hybrid)</span>
            <span class="pay">$60 - $70 / hour</span>
            <time class="ago">Posted 2 days ago</time>
            <a class="apply" href="/jobs/123">Apply</a>
            Contract to hire role on the platform team.
          </div>
          <div class="job-card">
            <h2 class="title">ETL Developer</h2>
            <a class="apply" href="https://other.example.com/jobs/456">Apply</a>
          </div>
          <div class="job-card">
            <span class="company">No Title Corp</span>
          </div>
        </body></html>"#;

    #[test]
    fn test_parse_listing_extracts_cards() {
        let jobs = sample_source().parse_listing(LISTING);
        assert_eq!(jobs.len(), 2);

        let first = &jobs[0];
        assert_eq!(first.title, "Data Engineer");
        assert_eq!(first.company.as_deref(), Some("Staffing Inc"));
        assert_eq!(first.location.as_deref(), Some("Austin, TX (Hybrid)"));
        // (60+70)/2 * 2080
        assert_eq!(first.salary, Some(135_200));
        assert_eq!(first.url.as_deref(), Some("https://jobs.example.com/jobs/123"));
        assert_eq!(first.job_type, Some(JobType::ContractToHire));
        assert!(first.posted_date.is_some());
    }

    #[test]
    fn test_absolute_links_pass_through() {
        let jobs = sample_source().parse_listing(LISTING);
        assert_eq!(
            jobs[1].url.as_deref(),
            Some("https://other.example.com/jobs/456")
        );
    }

    #[test]
    fn test_card_without_title_is_dropped() {
        let jobs = sample_source().parse_listing(LISTING);
        assert!(jobs.iter().all(|j| !j.title.is_empty()));
    }

    #[test]
    fn test_selector_fallback_order() {
        let html = r#"<ul><li class="posting"><h2 class="title">Analyst</h2></li></ul>"#;
        let jobs = sample_source().parse_listing(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Analyst");
        // No card text markers and a configured default of "contract".
        assert_eq!(jobs[0].job_type, Some(JobType::Contract));
    }

    #[test]
    fn test_no_matching_card_selector_yields_nothing() {
        let jobs = sample_source().parse_listing("<html><body><p>404</p></body></html>");
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_search_url_substitution() {
        let source = sample_source();
        assert_eq!(
            source.search_url("data engineer"),
            "https://jobs.example.com/search?q=data+engineer"
        );
    }

    #[test]
    fn test_missing_company_defaults_to_board_name() {
        let html = r#"<div class="job-card"><h2 class="title">DE</h2></div>"#;
        let jobs = sample_source().parse_listing(html);
        assert_eq!(jobs[0].company.as_deref(), Some("TestBoard"));
    }
}
