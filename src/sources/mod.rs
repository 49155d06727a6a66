mod arbeitnow;
mod board;
mod remoteok;
mod remotive;

pub use arbeitnow::ArbeitnowSource;
pub use board::BoardSource;
pub use remoteok::RemoteOkSource;
pub use remotive::RemotiveSource;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

use crate::config::Config;
use crate::models::JobRecord;

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// One job board. Implementations are blocking and may fail or block for
/// a while; the orchestrator isolates them on a bounded worker pool and
/// treats any error as an empty result for that source. Adapters must
/// drop records without a title before returning.
pub trait JobSource: Send + Sync {
    fn name(&self) -> &str;
    fn scrape(&self) -> Result<Vec<JobRecord>>;
}

/// Every configured adapter instance for a run.
pub fn build_sources(config: &Config) -> Vec<Box<dyn JobSource>> {
    let mut sources: Vec<Box<dyn JobSource>> = vec![
        Box::new(RemoteOkSource::new(config)),
        Box::new(RemotiveSource::new(config)),
        Box::new(ArbeitnowSource::new(config)),
    ];
    for board in &config.boards {
        sources.push(Box::new(BoardSource::new(board.clone(), config)));
    }
    sources
}

/// Politeness pause between requests to the same site.
pub(crate) fn polite_delay(min_ms: u64, max_ms: u64) {
    let ms = if max_ms > min_ms {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    } else {
        min_ms
    };
    std::thread::sleep(std::time::Duration::from_millis(ms));
}

fn salary_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d,]+").expect("static regex"))
}

/// Pull an annualized USD estimate out of free text like
/// "$55 - $65 / hour" or "$120,000-$150,000". Ranges are averaged;
/// hourly/weekly/monthly figures are annualized.
pub fn parse_salary(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();
    let cleaned = text.replace('$', "");

    let values: Vec<f64> = salary_number_re()
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .collect();
    if values.is_empty() {
        return None;
    }

    let mut avg = values.iter().sum::<f64>() / values.len() as f64;
    if lower.contains("hour") && avg < 1_000.0 {
        avg *= 2_080.0;
    } else if lower.contains("month") && avg < 50_000.0 {
        avg *= 12.0;
    } else if lower.contains("week") && avg < 10_000.0 {
        avg *= 52.0;
    }
    Some(avg as i64)
}

fn relative_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*(s|m|h|d|w|hour|min|day|week|month)").expect("static regex")
    })
}

/// Turn "posted 3 days ago" style text into a timestamp. Unparseable
/// text is treated as "just posted" rather than unknown, matching how
/// boards usually surface only recent listings.
pub fn parse_relative_date(text: &str) -> DateTime<Utc> {
    let now = Utc::now();
    if text.is_empty() {
        return now;
    }
    let lower = text.to_lowercase();
    if ["just", "now", "today", "moment"].iter().any(|w| lower.contains(w)) {
        return now;
    }

    if let Some(caps) = relative_date_re().captures(&lower) {
        let n: i64 = caps[1].parse().unwrap_or(0);
        let unit = &caps[2];
        return match unit.chars().next() {
            Some('s') => now - Duration::seconds(n),
            Some('m') => {
                if lower.contains("min") {
                    now - Duration::minutes(n)
                } else {
                    now - Duration::days(n * 30)
                }
            }
            Some('h') => now - Duration::hours(n),
            Some('d') => now - Duration::days(n),
            Some('w') => now - Duration::weeks(n),
            _ => now,
        };
    }
    now
}

/// Bound a scraped description and strip leftover whitespace runs.
pub fn clean_description(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(crate::models::MAX_DESCRIPTION_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_salary_annual_range() {
        assert_eq!(parse_salary("$120,000 - $150,000"), Some(135_000));
    }

    #[test]
    fn test_parse_salary_single_value() {
        assert_eq!(parse_salary("$95,000 per year"), Some(95_000));
    }

    #[test]
    fn test_parse_salary_hourly_is_annualized() {
        // (55+65)/2 * 2080
        assert_eq!(parse_salary("$55 - $65 / hour"), Some(124_800));
    }

    #[test]
    fn test_parse_salary_monthly_is_annualized() {
        assert_eq!(parse_salary("$10,000 per month"), Some(120_000));
    }

    #[test]
    fn test_parse_salary_weekly_is_annualized() {
        assert_eq!(parse_salary("$2,000/week"), Some(104_000));
    }

    #[test]
    fn test_parse_salary_garbage() {
        assert_eq!(parse_salary(""), None);
        assert_eq!(parse_salary("competitive pay"), None);
    }

    #[test]
    fn test_parse_relative_date_units() {
        let now = Utc::now();
        let three_days = parse_relative_date("Posted 3 days ago");
        let diff = now - three_days;
        assert!((diff - Duration::days(3)).num_seconds().abs() < 5);

        let five_hours = parse_relative_date("5h ago");
        let diff = now - five_hours;
        assert!((diff - Duration::hours(5)).num_seconds().abs() < 5);

        let two_weeks = parse_relative_date("2 weeks ago");
        let diff = now - two_weeks;
        assert!((diff - Duration::weeks(2)).num_seconds().abs() < 5);
    }

    #[test]
    fn test_parse_relative_date_just_posted() {
        let now = Utc::now();
        for text in ["just now", "today", "Posted moments ago", "", "yesterday-ish"] {
            let parsed = parse_relative_date(text);
            assert!((now - parsed).num_seconds().abs() < 5, "text: {:?}", text);
        }
    }

    #[test]
    fn test_parse_relative_date_minutes_vs_months() {
        let now = Utc::now();
        let minutes = parse_relative_date("30 min ago");
        assert!((now - minutes - Duration::minutes(30)).num_seconds().abs() < 5);

        let months = parse_relative_date("2 months ago");
        assert!((now - months - Duration::days(60)).num_seconds().abs() < 5);
    }

    #[test]
    fn test_clean_description_collapses_and_truncates() {
        assert_eq!(
            clean_description("  build   data\n\npipelines  ").as_deref(),
            Some("build data pipelines")
        );
        assert!(clean_description("   ").is_none());

        let long = "x".repeat(2_000);
        assert_eq!(
            clean_description(&long).unwrap().chars().count(),
            crate::models::MAX_DESCRIPTION_LEN
        );
    }

    #[test]
    fn test_build_sources_includes_boards() {
        let config = Config::default();
        let sources = build_sources(&config);
        // Three API adapters plus one per configured board.
        assert_eq!(sources.len(), 3 + config.boards.len());
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert!(names.contains(&"RemoteOK"));
        assert!(names.contains(&"TEKsystems"));
    }
}
