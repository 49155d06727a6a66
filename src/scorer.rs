use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::models::JobRecord;

// Title keywords. A core hit is worth more than a technology-only hit.
const CORE_TITLE_KEYWORDS: &[&str] = &[
    "data engineer",
    "etl engineer",
    "pipeline engineer",
    "analytics engineer",
    "ml engineer",
    "machine learning engineer",
    "data pipeline",
    "etl developer",
];

const TECH_TITLE_KEYWORDS: &[&str] = &[
    "spark", "kafka", "airflow", "dbt", "snowflake", "databricks", "bigquery",
    "redshift", "flink", "beam", "hive", "hadoop", "aws", "gcp", "azure",
    "python", "sql",
];

/// Computes a relevance score in 0..=100 per record.
///
/// Point table (raw max ~130, clamped to 100 so mostly-excellent records
/// still saturate):
///   title core +20 / tech-only +10; description +3 per include-keyword
///   hit capped at 15; freshness <=12h +25, <=24h +20, <=48h +10,
///   <=72h +5; applicants <25 +20, <50 +15, <100 +10, unknown +10;
///   easy apply +15; remote/hybrid +10; salary >=150k +10, >=100k +5;
///   dream company +15.
pub struct Scorer<'a> {
    config: &'a Config,
    now: DateTime<Utc>,
}

impl<'a> Scorer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self::with_now(config, Utc::now())
    }

    /// Pin the clock so scores are a pure function of record + config.
    pub fn with_now(config: &'a Config, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn score(&self, job: &JobRecord) -> u8 {
        let mut points: i64 = 0;

        let title_lower = job.title.to_lowercase();
        if CORE_TITLE_KEYWORDS.iter().any(|kw| title_lower.contains(kw)) {
            points += 20;
        } else if TECH_TITLE_KEYWORDS.iter().any(|kw| title_lower.contains(kw)) {
            points += 10;
        }

        let desc_lower = job.description.as_deref().unwrap_or("").to_lowercase();
        let keyword_hits = self
            .config
            .include_keywords
            .iter()
            .filter(|kw| desc_lower.contains(&kw.to_lowercase()))
            .count() as i64;
        points += (keyword_hits * 3).min(15);

        if let Some(posted) = job.posted_date {
            let age = self.now - posted;
            if age <= Duration::hours(12) {
                points += 25;
            } else if age <= Duration::hours(24) {
                points += 20;
            } else if age <= Duration::hours(48) {
                points += 10;
            } else if age <= Duration::hours(72) {
                points += 5;
            }
        }

        // Unknown applicant count gets flat partial credit rather than a
        // penalty.
        points += match job.applicants {
            Some(n) if n < 25 => 20,
            Some(n) if n < 50 => 15,
            Some(n) if n < 100 => 10,
            Some(_) => 0,
            None => 10,
        };

        if job.easy_apply == Some(true) {
            points += 15;
        }

        let location_lower = job.location.as_deref().unwrap_or("").to_lowercase();
        if location_lower.contains("remote") || location_lower.contains("hybrid") {
            points += 10;
        }

        match job.salary {
            Some(s) if s >= 150_000 => points += 10,
            Some(s) if s >= 100_000 => points += 5,
            _ => {}
        }

        let company_lower = job.company.as_deref().unwrap_or("").to_lowercase();
        if self
            .config
            .dream_companies
            .iter()
            .any(|dream| company_lower.contains(&dream.to_lowercase()))
        {
            points += 15;
        }

        points.clamp(0, 100) as u8
    }

    /// Assigns a score to every record in place and returns them sorted
    /// descending; ties keep their relative input order (stable sort).
    pub fn score_all(&self, mut jobs: Vec<JobRecord>) -> Vec<JobRecord> {
        for job in &mut jobs {
            job.score = self.score(job);
        }
        jobs.sort_by_key(|j| std::cmp::Reverse(j.score));
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::default()
    }

    fn job(title: &str) -> JobRecord {
        JobRecord::new(title, "test")
    }

    fn maxed_job(now: DateTime<Utc>) -> JobRecord {
        let mut j = job("Senior Data Engineer");
        j.company = Some("Google".to_string());
        j.location = Some("Remote".to_string());
        j.salary = Some(200_000);
        j.posted_date = Some(now - Duration::hours(1));
        j.applicants = Some(3);
        j.easy_apply = Some(true);
        j.description = Some(
            "ETL data pipeline with Spark, Kafka, Airflow, dbt, SQL, Python on AWS".to_string(),
        );
        j
    }

    #[test]
    fn test_score_is_bounded() {
        let config = config();
        let now = Utc::now();
        let scorer = Scorer::with_now(&config, now);

        // Raw points well above 100 must clamp.
        let maxed = maxed_job(now);
        assert_eq!(scorer.score(&maxed), 100);

        // An empty record never goes below 0 (unknown applicants still
        // earns partial credit).
        let bare = job("Receptionist");
        let s = scorer.score(&bare);
        assert_eq!(s, 10);
    }

    #[test]
    fn test_scenario_a_scores_ninety() {
        // title +20, freshness +25, applicants +20, easy apply +15,
        // remote +10; salary 90k is below every bonus tier.
        let config = config();
        let now = Utc::now();
        let scorer = Scorer::with_now(&config, now);

        let mut j = job("Data Engineer");
        j.salary = Some(90_000);
        j.posted_date = Some(now - Duration::hours(1));
        j.applicants = Some(10);
        j.easy_apply = Some(true);
        j.location = Some("Remote".to_string());
        j.company = Some("Acme".to_string());

        let s = scorer.score(&j);
        assert_eq!(s, 90);
        assert!(s >= 80);
    }

    #[test]
    fn test_title_core_beats_tech_only() {
        let config = config();
        let scorer = Scorer::with_now(&config, Utc::now());
        let core = scorer.score(&job("Data Engineer"));
        let tech = scorer.score(&job("Spark Developer"));
        let neither = scorer.score(&job("Accountant"));
        assert_eq!(core - tech, 10);
        assert_eq!(tech - neither, 10);
    }

    #[test]
    fn test_description_keywords_capped() {
        let config = config();
        let scorer = Scorer::with_now(&config, Utc::now());

        let mut two_hits = job("Receptionist");
        two_hits.description = Some("We use Kafka and Airflow".to_string());
        let mut many_hits = job("Receptionist");
        many_hits.description =
            Some("Spark Kafka Airflow dbt SQL Python AWS GCP Azure data warehouse".to_string());

        let base = scorer.score(&job("Receptionist"));
        assert_eq!(scorer.score(&two_hits) - base, 6);
        assert_eq!(scorer.score(&many_hits) - base, 15);
    }

    #[test]
    fn test_freshness_tiers() {
        let config = config();
        let now = Utc::now();
        let scorer = Scorer::with_now(&config, now);
        let base = scorer.score(&job("Receptionist"));

        let at_age = |hours: i64| {
            let mut j = job("Receptionist");
            j.posted_date = Some(now - Duration::hours(hours));
            scorer.score(&j)
        };

        assert_eq!(at_age(6) - base, 25);
        assert_eq!(at_age(18) - base, 20);
        assert_eq!(at_age(36) - base, 10);
        assert_eq!(at_age(60) - base, 5);
        assert_eq!(at_age(100), base);
    }

    #[test]
    fn test_applicant_tiers_and_partial_credit() {
        let config = config();
        let scorer = Scorer::with_now(&config, Utc::now());

        let with_applicants = |n: Option<i64>| {
            let mut j = job("Receptionist");
            j.applicants = n;
            scorer.score(&j)
        };

        assert_eq!(with_applicants(Some(10)), 20);
        assert_eq!(with_applicants(Some(30)), 15);
        assert_eq!(with_applicants(Some(75)), 10);
        assert_eq!(with_applicants(Some(500)), 0);
        // Unknown is treated optimistically, not penalized.
        assert_eq!(with_applicants(None), 10);
    }

    #[test]
    fn test_easy_apply_monotonicity() {
        let config = config();
        let scorer = Scorer::with_now(&config, Utc::now());

        let mut with = job("Data Engineer");
        with.easy_apply = Some(true);
        let mut without = with.clone();
        without.easy_apply = Some(false);

        assert!(scorer.score(&with) >= scorer.score(&without));
        assert_eq!(scorer.score(&with) - scorer.score(&without), 15);
    }

    #[test]
    fn test_salary_tiers_and_unknown() {
        let config = config();
        let scorer = Scorer::with_now(&config, Utc::now());

        let with_salary = |s: Option<i64>| {
            let mut j = job("Receptionist");
            j.salary = s;
            scorer.score(&j)
        };

        let unknown = with_salary(None);
        assert_eq!(with_salary(Some(150_000)) - unknown, 10);
        assert_eq!(with_salary(Some(120_000)) - unknown, 5);
        assert_eq!(with_salary(Some(90_000)), unknown);
    }

    #[test]
    fn test_dream_company_substring_match() {
        let config = config();
        let scorer = Scorer::with_now(&config, Utc::now());

        let mut j = job("Receptionist");
        j.company = Some("Amazon Web Services".to_string());
        let base = scorer.score(&job("Receptionist"));
        assert_eq!(scorer.score(&j) - base, 15);
    }

    #[test]
    fn test_score_all_sorts_descending_and_is_stable() {
        let config = config();
        let now = Utc::now();
        let scorer = Scorer::with_now(&config, now);

        let strong = maxed_job(now);
        let mut tied_a = job("Receptionist A");
        tied_a.url = Some("a".to_string());
        let mut tied_b = job("Receptionist B");
        tied_b.url = Some("b".to_string());

        let out = scorer.score_all(vec![tied_a, strong, tied_b]);
        assert_eq!(out[0].score, 100);
        // Tied records keep relative input order.
        assert_eq!(out[1].url.as_deref(), Some("a"));
        assert_eq!(out[2].url.as_deref(), Some("b"));
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));

        // Scoring again changes nothing.
        let rescored = scorer.score_all(out.clone());
        let a: Vec<_> = out.iter().map(|j| (j.url.clone(), j.score)).collect();
        let b: Vec<_> = rescored.iter().map(|j| (j.url.clone(), j.score)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_score_is_deterministic() {
        let config = config();
        let now = Utc::now();
        let scorer = Scorer::with_now(&config, now);
        let j = maxed_job(now);
        assert_eq!(scorer.score(&j), scorer.score(&j));
    }
}
