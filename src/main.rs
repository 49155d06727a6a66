mod ai;
mod config;
mod db;
mod dedup;
mod filter;
mod models;
mod notify;
mod pipeline;
mod scorer;
mod sources;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ai::LlmClient;
use config::Config;
use db::Database;
use models::StoredJob;
use pipeline::{RunOptions, RunSummary};

#[derive(Parser)]
#[command(name = "trawl")]
#[command(about = "Job board aggregator - scrape, score, and surface the postings worth applying to")]
struct Cli {
    /// Path to a TOML config file (defaults are used without one)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Scrape all sources and run the full pipeline
    Run {
        /// Skip LLM enrichment even when an API key is configured
        #[arg(long)]
        no_llm: bool,

        /// Score and print results without persisting or notifying
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored jobs
    List {
        /// Only show jobs at or above this score
        #[arg(short, long, default_value = "0")]
        min_score: u8,

        /// Number of jobs to show
        #[arg(short, long, default_value = "25")]
        limit: usize,
    },

    /// Show job details
    Show {
        /// Job ID
        id: i64,
    },

    /// Send alerts for stored jobs above the alert threshold
    Notify {
        /// Show what would be sent without sending
        #[arg(long)]
        dry_run: bool,
    },

    /// Track your progress on a job
    Mark {
        /// Job ID
        id: i64,

        /// Mark as applied
        #[arg(long)]
        applied: bool,

        /// Mark as saved for later
        #[arg(long)]
        saved: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let db = Database::open(config.db_path.as_deref())?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Run { no_llm, dry_run } => {
            db.ensure_initialized()?;

            let llm = if no_llm {
                LlmClient::disabled()
            } else {
                LlmClient::new(config.llm.clone())
            };
            if !no_llm && !llm.available() {
                println!("No LLM API key configured; skipping enrichment.");
            }

            let sources = sources::build_sources(&config);
            println!("Scraping {} sources...", sources.len());

            let summary = pipeline::run(&config, &db, sources, &llm, RunOptions { dry_run })?;
            print_summary(&summary);

            if dry_run {
                println!("\n(Dry run - nothing was saved or sent)");
            }
        }

        Commands::List { min_score, limit } => {
            db.ensure_initialized()?;
            let jobs = db.list_jobs(min_score, limit)?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                print_job_table(&jobs);
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_job(id)? {
                Some(stored) => print_job_detail(&stored),
                None => println!("Job #{} not found.", id),
            }
        }

        Commands::Notify { dry_run } => {
            db.ensure_initialized()?;
            if dry_run {
                let due = db.get_unnotified(config.alert_score_threshold)?;
                if due.is_empty() {
                    println!("Nothing to send.");
                } else {
                    println!("Would notify {} job(s):", due.len());
                    print_job_table(&due);
                }
            } else {
                let sent = pipeline::dispatch_alerts(&config, &db)?;
                if sent == 0 {
                    println!("Nothing to send.");
                } else {
                    println!("Notified for {} job(s).", sent);
                }
            }
        }

        Commands::Mark { id, applied, saved } => {
            db.ensure_initialized()?;
            if !applied && !saved {
                println!("Nothing to mark. Use --applied or --saved.");
                return Ok(());
            }
            if applied {
                if db.set_applied(id)? {
                    println!("Marked job #{} as applied.", id);
                } else {
                    println!("Job #{} not found.", id);
                }
            }
            if saved {
                if db.set_saved(id)? {
                    println!("Marked job #{} as saved.", id);
                } else {
                    println!("Job #{} not found.", id);
                }
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\nSources:");
    for report in &summary.sources {
        let status = if report.failed { "FAILED" } else { "ok" };
        println!("  {:<20} {:>5} jobs  {}", report.name, report.fetched, status);
    }

    println!("\nPipeline:");
    println!("  Fetched:      {}", summary.fetched);
    println!("  After dedup:  {}", summary.after_dedup);
    println!("  After filter: {}", summary.after_filter);
    if summary.enriched > 0 {
        println!("  LLM enriched: {}", summary.enriched);
    }
    println!("  New in db:    {}", summary.inserted);
    if summary.notified > 0 {
        println!("  Notified:     {}", summary.notified);
    }
    println!("  Elapsed:      {:.1}s", summary.elapsed.as_secs_f64());

    if !summary.top.is_empty() {
        println!("\nTop matches:");
        println!("{:<6} {:<32} {:<20} {:<12} {:>8}", "SCORE", "TITLE", "COMPANY", "SALARY", "AGE");
        println!("{}", "-".repeat(82));
        let now = chrono::Utc::now();
        for job in &summary.top {
            let salary = job
                .salary
                .map(|s| format!("${}k", s / 1000))
                .unwrap_or_else(|| "-".to_string());
            let age = job
                .posted_date
                .map(|d| format!("{}h", (now - d).num_hours().max(0)))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<6} {:<32} {:<20} {:<12} {:>8}",
                job.score,
                truncate(&job.title, 30),
                truncate(job.company.as_deref().unwrap_or("-"), 18),
                salary,
                age
            );
        }
    }
}

fn print_job_table(jobs: &[StoredJob]) {
    println!(
        "{:<6} {:<6} {:<30} {:<18} {:<12} {:<10}",
        "ID", "SCORE", "TITLE", "COMPANY", "SALARY", "FLAGS"
    );
    println!("{}", "-".repeat(86));
    for stored in jobs {
        let job = &stored.record;
        let salary = job
            .salary
            .map(|s| format!("${}k", s / 1000))
            .unwrap_or_else(|| "-".to_string());
        let mut flags = String::new();
        if stored.applied {
            flags.push('A');
        }
        if stored.saved {
            flags.push('S');
        }
        if stored.notified {
            flags.push('N');
        }
        println!(
            "{:<6} {:<6} {:<30} {:<18} {:<12} {:<10}",
            stored.id,
            job.score,
            truncate(&job.title, 28),
            truncate(job.company.as_deref().unwrap_or("-"), 16),
            salary,
            flags
        );
    }
}

fn print_job_detail(stored: &StoredJob) {
    let job = &stored.record;
    println!("Job #{}", stored.id);
    println!("Title: {}", job.title);
    if let Some(company) = &job.company {
        println!("Company: {}", company);
    }
    if let Some(location) = &job.location {
        println!("Location: {}", location);
    }
    println!("Source: {}", job.source);
    println!("Score: {}", job.score);
    if let Some(salary) = job.salary {
        println!("Salary: ${}", salary);
    }
    if let Some(job_type) = job.job_type {
        println!("Type: {}", job_type.as_str());
    }
    if let Some(category) = job.role_category {
        println!("Role: {}", category.as_str());
    }
    if let Some(posted) = job.posted_date {
        println!("Posted: {}", posted.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(applicants) = job.applicants {
        println!("Applicants: {}", applicants);
    }
    if let Some(easy_apply) = job.easy_apply {
        println!("Easy apply: {}", if easy_apply { "yes" } else { "no" });
    }
    if let Some(url) = &job.url {
        println!("URL: {}", url);
    }
    println!("Scraped: {}", stored.scraped_at);

    let mut status = Vec::new();
    if stored.applied {
        status.push("applied");
    }
    if stored.saved {
        status.push("saved");
    }
    if stored.notified {
        status.push("notified");
    }
    if !status.is_empty() {
        println!("Status: {}", status.join(", "));
    }

    if let Some(llm_score) = job.llm_score {
        println!("\nAI assessment: {}/100", llm_score);
        if let Some(reason) = &job.llm_reason {
            println!("  {}", reason);
        }
        if let Some(summary) = &job.llm_summary {
            println!("  {}", summary);
        }
        if !job.skills.is_empty() {
            println!("  Skills: {}", job.skills.join(", "));
        }
    }

    if let Some(description) = &job.description {
        println!("\n--- Description ---\n{}", description);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title here", 10), "a much ...");
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from(["trawl", "run", "--dry-run", "--no-llm"]).unwrap();
        match cli.command {
            Commands::Run { no_llm, dry_run } => {
                assert!(no_llm);
                assert!(dry_run);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::try_parse_from(["trawl", "list", "--config", "/tmp/trawl.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/trawl.toml")));
    }
}
