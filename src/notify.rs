use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TelegramSettings;
use crate::models::StoredJob;

const DIGEST_LIMIT: usize = 10;

/// Delivers match digests. With a Telegram bot token and chat id
/// configured the digest goes out over the bot API; otherwise it is
/// printed to stdout so a cron run still surfaces matches in mail.
pub struct Notifier {
    settings: TelegramSettings,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl Notifier {
    pub fn new(settings: &TelegramSettings) -> Self {
        Self {
            settings: settings.clone(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Send a digest for the given jobs. Returns Ok(true) only when the
    /// digest was actually delivered; callers must not mark jobs
    /// notified otherwise.
    pub fn send_digest(&self, jobs: &[StoredJob]) -> Result<bool> {
        if jobs.is_empty() {
            return Ok(false);
        }
        let text = render_digest(jobs);

        match (&self.settings.bot_token, &self.settings.chat_id) {
            (Some(token), Some(chat_id)) => {
                match self.send_telegram(token, chat_id, &text) {
                    Ok(()) => {
                        info!("sent Telegram digest for {} jobs", jobs.len());
                        Ok(true)
                    }
                    Err(e) => {
                        warn!("Telegram delivery failed: {:#}", e);
                        Ok(false)
                    }
                }
            }
            _ => {
                println!("{}", text);
                Ok(true)
            }
        }
    }

    fn send_telegram(&self, token: &str, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
        self.client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .and_then(|r| r.error_for_status())
            .context("Telegram sendMessage failed")?;
        Ok(())
    }
}

fn render_digest(jobs: &[StoredJob]) -> String {
    let mut out = format!("Job matches: {} new\n", jobs.len());
    for stored in jobs.iter().take(DIGEST_LIMIT) {
        let job = &stored.record;
        out.push_str(&format!(
            "\n[{}] {} at {}\n",
            job.score,
            job.title,
            job.company.as_deref().unwrap_or("?")
        ));
        if let Some(salary) = job.salary {
            out.push_str(&format!("  ${}\n", salary));
        }
        if let Some(reason) = &job.llm_reason {
            out.push_str(&format!("  {}\n", reason));
        }
        if let Some(url) = &job.url {
            out.push_str(&format!("  {}\n", url));
        }
    }
    if jobs.len() > DIGEST_LIMIT {
        out.push_str(&format!("\n...and {} more\n", jobs.len() - DIGEST_LIMIT));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobRecord;
    use chrono::Utc;

    fn stored(title: &str, score: u8) -> StoredJob {
        let mut record = JobRecord::new(title, "test");
        record.company = Some("Acme".to_string());
        record.url = Some("https://example.com/1".to_string());
        record.salary = Some(120_000);
        record.score = score;
        StoredJob {
            id: 1,
            record,
            scraped_at: Utc::now().to_rfc3339(),
            notified: false,
            applied: false,
            saved: false,
        }
    }

    #[test]
    fn test_render_digest_contents() {
        let digest = render_digest(&[stored("Data Engineer", 85)]);
        assert!(digest.contains("1 new"));
        assert!(digest.contains("[85] Data Engineer at Acme"));
        assert!(digest.contains("$120000"));
        assert!(digest.contains("https://example.com/1"));
    }

    #[test]
    fn test_render_digest_truncates_long_lists() {
        let jobs: Vec<StoredJob> = (0..15).map(|i| stored(&format!("Job {}", i), 70)).collect();
        let digest = render_digest(&jobs);
        assert!(digest.contains("15 new"));
        assert!(digest.contains("...and 5 more"));
        assert!(!digest.contains("Job 12"));
    }

    #[test]
    fn test_empty_digest_is_not_sent() {
        let notifier = Notifier::new(&TelegramSettings::default());
        assert!(!notifier.send_digest(&[]).unwrap());
    }

    #[test]
    fn test_stdout_fallback_reports_delivered() {
        let notifier = Notifier::new(&TelegramSettings::default());
        assert!(notifier.send_digest(&[stored("Data Engineer", 85)]).unwrap());
    }
}
