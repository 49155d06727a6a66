use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{JobRecord, JobType, RoleCategory, StoredJob};

/// SQLite persistence. Jobs are keyed by their listing `url`; the
/// notified/applied/saved flags live here and are never written by the
/// pipeline stages.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "trawl") {
            Ok(proj_dirs.data_dir().join("trawl.db"))
        } else {
            Ok(PathBuf::from("trawl.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                title         TEXT NOT NULL,
                company       TEXT,
                location      TEXT,
                salary        INTEGER,
                url           TEXT UNIQUE,
                source        TEXT NOT NULL,
                posted_date   TEXT,
                easy_apply    INTEGER,
                applicants    INTEGER,
                description   TEXT,
                job_type      TEXT,
                role_category TEXT,
                score         INTEGER NOT NULL DEFAULT 0,
                llm_score     INTEGER,
                llm_reason    TEXT,
                llm_summary   TEXT,
                skills        TEXT NOT NULL DEFAULT '[]',
                scraped_at    TEXT NOT NULL DEFAULT (datetime('now')),
                notified      INTEGER NOT NULL DEFAULT 0,
                applied       INTEGER NOT NULL DEFAULT 0,
                saved         INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_score    ON jobs(score);
            CREATE INDEX IF NOT EXISTS idx_jobs_notified ON jobs(notified);
            CREATE INDEX IF NOT EXISTS idx_jobs_scraped  ON jobs(scraped_at);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'trawl init' first."));
        }
        Ok(())
    }

    /// Insert-or-ignore by url. Returns the number of new rows. A failure
    /// on one record is logged and the rest still go in.
    pub fn upsert_jobs(&self, jobs: &[JobRecord]) -> usize {
        let scraped_at = Utc::now().to_rfc3339();
        let mut new_count = 0usize;

        for job in jobs {
            let result = self.conn.execute(
                "INSERT OR IGNORE INTO jobs
                    (title, company, location, salary, url, source, posted_date,
                     easy_apply, applicants, description, job_type, role_category,
                     score, llm_score, llm_reason, llm_summary, skills, scraped_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
                params![
                    job.title,
                    job.company,
                    job.location,
                    job.salary,
                    job.url,
                    job.source,
                    job.posted_date.map(|d| d.to_rfc3339()),
                    job.easy_apply.map(|b| b as i64),
                    job.applicants,
                    job.description,
                    job.job_type.map(|t| t.as_str()),
                    job.role_category.map(|r| r.as_str()),
                    job.score as i64,
                    job.llm_score.map(|s| s as i64),
                    job.llm_reason,
                    job.llm_summary,
                    serde_json::to_string(&job.skills).unwrap_or_else(|_| "[]".to_string()),
                    scraped_at,
                ],
            );
            match result {
                Ok(inserted) if inserted > 0 => new_count += 1,
                Ok(_) => {} // already stored under this url
                Err(e) => warn!("DB upsert error for '{}': {}", job.title, e),
            }
        }

        info!("DB: {} new jobs saved (out of {})", new_count, jobs.len());
        new_count
    }

    /// Jobs not yet notified about, at or above `min_score`, best first.
    pub fn get_unnotified(&self, min_score: u8) -> Result<Vec<StoredJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE notified = 0 AND score >= ?1 ORDER BY score DESC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([min_score as i64], Self::row_to_stored)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to query unnotified jobs")
    }

    pub fn mark_notified(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("UPDATE jobs SET notified = 1 WHERE id IN ({})", placeholders);
        self.conn
            .execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        info!("DB: marked {} jobs as notified", ids.len());
        Ok(())
    }

    pub fn list_jobs(&self, min_score: u8, limit: usize) -> Result<Vec<StoredJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE score >= ?1 ORDER BY score DESC, id ASC LIMIT ?2",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![min_score as i64, limit as i64], Self::row_to_stored)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")
    }

    pub fn get_job(&self, id: i64) -> Result<Option<StoredJob>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", SELECT_COLUMNS),
            [id],
            Self::row_to_stored,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_applied(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("UPDATE jobs SET applied = 1 WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    pub fn set_saved(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("UPDATE jobs SET saved = 1 WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn row_to_stored(row: &rusqlite::Row) -> rusqlite::Result<StoredJob> {
        let posted_date: Option<String> = row.get(7)?;
        let easy_apply: Option<i64> = row.get(8)?;
        let job_type: Option<String> = row.get(11)?;
        let role_category: Option<String> = row.get(12)?;
        let score: i64 = row.get(13)?;
        let llm_score: Option<i64> = row.get(14)?;
        let skills_json: String = row.get(17)?;

        let record = JobRecord {
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            salary: row.get(4)?,
            url: row.get(5)?,
            source: row.get(6)?,
            posted_date: posted_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            easy_apply: easy_apply.map(|v| v != 0),
            applicants: row.get(9)?,
            description: row.get(10)?,
            job_type: job_type.as_deref().and_then(JobType::parse),
            role_category: role_category.as_deref().and_then(RoleCategory::parse),
            score: score.clamp(0, 100) as u8,
            llm_score: llm_score.map(|s| s.clamp(0, 100) as u8),
            llm_reason: row.get(15)?,
            llm_summary: row.get(16)?,
            skills: serde_json::from_str(&skills_json).unwrap_or_default(),
        };

        Ok(StoredJob {
            id: row.get(0)?,
            record,
            scraped_at: row.get(18)?,
            notified: row.get::<_, i64>(19)? != 0,
            applied: row.get::<_, i64>(20)? != 0,
            saved: row.get::<_, i64>(21)? != 0,
        })
    }
}

const SELECT_COLUMNS: &str = "id, title, company, location, salary, url, source, posted_date, \
     easy_apply, applicants, description, job_type, role_category, score, \
     llm_score, llm_reason, llm_summary, skills, scraped_at, notified, applied, saved";
