use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::ai::LlmClient;
use crate::config::Config;
use crate::db::Database;
use crate::dedup::Deduplicator;
use crate::filter::Filter;
use crate::models::JobRecord;
use crate::notify::Notifier;
use crate::scorer::Scorer;
use crate::sources::JobSource;

const TOP_JOBS_IN_SUMMARY: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

/// Per-source outcome of the collection phase.
#[derive(Debug)]
pub struct SourceReport {
    pub name: String,
    pub fetched: usize,
    pub failed: bool,
}

/// Everything a run produced, for the CLI to print.
#[derive(Debug)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
    pub fetched: usize,
    pub after_dedup: usize,
    pub after_filter: usize,
    pub enriched: usize,
    pub inserted: usize,
    pub notified: usize,
    pub top: Vec<JobRecord>,
    pub elapsed: Duration,
}

/// Run the whole pipeline: collect from every source concurrently, then
/// dedup, filter, score, enrich, persist, and notify. A failing source
/// never fails the run; it just contributes zero jobs.
pub fn run(
    config: &Config,
    db: &Database,
    sources: Vec<Box<dyn JobSource>>,
    llm: &LlmClient,
    options: RunOptions,
) -> Result<RunSummary> {
    let started = Instant::now();

    let (reports, jobs) = collect(sources, config.max_workers)?;
    let fetched = jobs.len();
    info!("collected {} jobs from {} sources", fetched, reports.len());

    let jobs = Deduplicator::new(config.semantic_dedup_ceiling).deduplicate(jobs, llm);
    let after_dedup = jobs.len();

    let jobs = Filter::new(config).filter(jobs);
    let after_filter = jobs.len();

    let mut jobs = Scorer::new(config).score_all(jobs);

    let enriched = if llm.available() {
        llm.enrich_batch(&mut jobs, config.llm_max_jobs)
    } else {
        0
    };

    let top = jobs.iter().take(TOP_JOBS_IN_SUMMARY).cloned().collect();

    let (inserted, notified) = if options.dry_run {
        info!("dry run, skipping persistence and notification");
        (0, 0)
    } else {
        let inserted = db.upsert_jobs(&jobs);
        // A broken storage backend must not lose the ranked output; the
        // summary still goes back to the caller, just with nothing sent.
        let notified = match dispatch_alerts(config, db) {
            Ok(n) => n,
            Err(e) => {
                warn!("alert dispatch failed: {:#}", e);
                0
            }
        };
        (inserted, notified)
    };

    Ok(RunSummary {
        sources: reports,
        fetched,
        after_dedup,
        after_filter,
        enriched,
        inserted,
        notified,
        top,
        elapsed: started.elapsed(),
    })
}

/// Scrape every source on a bounded blocking pool. Panics and errors in
/// one source are contained to that source's report.
fn collect(
    sources: Vec<Box<dyn JobSource>>,
    max_workers: usize,
) -> Result<(Vec<SourceReport>, Vec<JobRecord>)> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start worker runtime")?;

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut reports = Vec::new();
    let mut jobs = Vec::new();

    runtime.block_on(async {
        let mut set = JoinSet::new();
        for source in sources {
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let name = source.name().to_string();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, Vec::new(), true);
                };
                match tokio::task::spawn_blocking(move || source.scrape()).await {
                    Ok(Ok(batch)) => (name, batch, false),
                    Ok(Err(e)) => {
                        warn!("source {} failed: {:#}", name, e);
                        (name, Vec::new(), true)
                    }
                    Err(e) => {
                        warn!("source {} worker panicked: {}", name, e);
                        (name, Vec::new(), true)
                    }
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, batch, failed)) => {
                    reports.push(SourceReport {
                        name,
                        fetched: batch.len(),
                        failed,
                    });
                    jobs.extend(batch);
                }
                Err(e) => warn!("collector task failed: {}", e),
            }
        }
    });

    Ok((reports, jobs))
}

/// Send a digest for stored jobs at or above the alert threshold, and
/// mark them notified only once delivery succeeded.
pub fn dispatch_alerts(config: &Config, db: &Database) -> Result<usize> {
    let due = db.get_unnotified(config.alert_score_threshold)?;
    if due.is_empty() {
        return Ok(0);
    }

    let notifier = Notifier::new(&config.telegram);
    if notifier.send_digest(&due)? {
        let ids: Vec<i64> = due.iter().map(|j| j.id).collect();
        db.mark_notified(&ids)?;
        Ok(due.len())
    } else {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct StaticSource {
        name: &'static str,
        jobs: Vec<JobRecord>,
    }

    impl JobSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }
        fn scrape(&self) -> Result<Vec<JobRecord>> {
            Ok(self.jobs.clone())
        }
    }

    struct FailingSource;

    impl JobSource for FailingSource {
        fn name(&self) -> &str {
            "Broken"
        }
        fn scrape(&self) -> Result<Vec<JobRecord>> {
            Err(anyhow!("connection refused"))
        }
    }

    struct PanickingSource;

    impl JobSource for PanickingSource {
        fn name(&self) -> &str {
            "Panicky"
        }
        fn scrape(&self) -> Result<Vec<JobRecord>> {
            panic!("bad slice index");
        }
    }

    fn good_job(title: &str, company: &str) -> JobRecord {
        let mut job = JobRecord::new(title, "test");
        job.company = Some(company.to_string());
        job.location = Some("Remote".to_string());
        job.url = Some(format!("https://example.com/{}/{}", company, title));
        job.salary = Some(120_000);
        job.posted_date = Some(chrono::Utc::now());
        job
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.max_workers = 2;
        config
    }

    #[test]
    fn test_collect_gathers_all_sources() {
        let sources: Vec<Box<dyn JobSource>> = vec![
            Box::new(StaticSource {
                name: "A",
                jobs: vec![good_job("Data Engineer", "Acme")],
            }),
            Box::new(StaticSource {
                name: "B",
                jobs: vec![good_job("ETL Developer", "Beta"), good_job("Data Engineer", "Gamma")],
            }),
        ];
        let (reports, jobs) = collect(sources, 4).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(jobs.len(), 3);
        assert!(reports.iter().all(|r| !r.failed));
    }

    #[test]
    fn test_failing_source_is_isolated() {
        let sources: Vec<Box<dyn JobSource>> = vec![
            Box::new(FailingSource),
            Box::new(StaticSource {
                name: "Good",
                jobs: vec![good_job("Data Engineer", "Acme")],
            }),
        ];
        let (reports, jobs) = collect(sources, 4).unwrap();
        assert_eq!(jobs.len(), 1);
        let broken = reports.iter().find(|r| r.name == "Broken").unwrap();
        assert!(broken.failed);
        assert_eq!(broken.fetched, 0);
    }

    #[test]
    fn test_panicking_source_is_isolated() {
        let sources: Vec<Box<dyn JobSource>> = vec![
            Box::new(PanickingSource),
            Box::new(StaticSource {
                name: "Good",
                jobs: vec![good_job("Data Engineer", "Acme")],
            }),
        ];
        let (reports, jobs) = collect(sources, 4).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(reports.iter().find(|r| r.name == "Panicky").unwrap().failed);
    }

    #[test]
    fn test_run_persists_and_scores() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();

        let sources: Vec<Box<dyn JobSource>> = vec![Box::new(StaticSource {
            name: "A",
            jobs: vec![
                good_job("Data Engineer", "Acme"),
                good_job("Data Engineer", "Acme"), // exact duplicate
            ],
        })];

        let summary = run(&config, &db, sources, &LlmClient::disabled(), RunOptions::default())
            .unwrap();
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.after_dedup, 1);
        assert_eq!(summary.after_filter, 1);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.enriched, 0);
        assert!(summary.top[0].score > 0);

        // Second run against the same database inserts nothing new.
        let sources: Vec<Box<dyn JobSource>> = vec![Box::new(StaticSource {
            name: "A",
            jobs: vec![good_job("Data Engineer", "Acme")],
        })];
        let summary = run(&config, &db, sources, &LlmClient::disabled(), RunOptions::default())
            .unwrap();
        assert_eq!(summary.inserted, 0);
    }

    #[test]
    fn test_dry_run_skips_persistence() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();

        let sources: Vec<Box<dyn JobSource>> = vec![Box::new(StaticSource {
            name: "A",
            jobs: vec![good_job("Data Engineer", "Acme")],
        })];
        let options = RunOptions { dry_run: true };
        let summary = run(&config, &db, sources, &LlmClient::disabled(), options).unwrap();
        assert_eq!(summary.inserted, 0);
        assert!(db.list_jobs(0, 100).unwrap().is_empty());
    }

    #[test]
    fn test_storage_failure_still_returns_summary() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        // Break the backend after startup; every storage call from here
        // on fails.
        db.execute_raw("DROP TABLE jobs").unwrap();

        let sources: Vec<Box<dyn JobSource>> = vec![Box::new(StaticSource {
            name: "A",
            jobs: vec![good_job("Data Engineer", "Acme")],
        })];
        let summary = run(&config, &db, sources, &LlmClient::disabled(), RunOptions::default())
            .unwrap();
        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.notified, 0);
        // The ranked in-memory output survives the backend failure.
        assert_eq!(summary.top.len(), 1);
        assert!(summary.top[0].score > 0);
    }

    #[test]
    fn test_run_with_no_jobs_completes() {
        let config = test_config();
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();

        let summary = run(&config, &db, Vec::new(), &LlmClient::disabled(), RunOptions::default())
            .unwrap();
        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.notified, 0);
        assert!(summary.top.is_empty());
    }
}
