use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::ai::{cosine_similarity, LlmClient};
use crate::models::JobRecord;

/// Cosine similarity at or above this means two postings are the same job.
const SIMILARITY_THRESHOLD: f32 = 0.97;

/// Collapses the raw concatenation of all adapters' outputs into one
/// record per physically distinct job.
///
/// Pass 1 groups by an exact identity key; pass 2 (optional, bounded)
/// catches near-duplicates like "Sr. Data Engineer" vs "Senior Data
/// Engineer" via embedding similarity. Scoped to a single run.
pub struct Deduplicator {
    semantic_ceiling: usize,
}

impl Deduplicator {
    pub fn new(semantic_ceiling: usize) -> Self {
        Self { semantic_ceiling }
    }

    pub fn deduplicate(&self, jobs: Vec<JobRecord>, llm: &LlmClient) -> Vec<JobRecord> {
        let raw = jobs.len();
        let exact = dedup_exact(jobs);
        info!("Dedup pass-1 (exact): {} -> {}", raw, exact.len());

        if llm.available() && exact.len() <= self.semantic_ceiling {
            let before = exact.len();
            let semantic = self.dedup_semantic(exact, |text| llm.embed(text));
            info!("Dedup pass-2 (semantic): {} -> {}", before, semantic.len());
            return semantic;
        }

        exact
    }

    /// Pass 2 over pass-1 survivors. The embedding lookup is a closure so
    /// the clustering logic is independent of any live endpoint.
    fn dedup_semantic<F>(&self, jobs: Vec<JobRecord>, embed: F) -> Vec<JobRecord>
    where
        F: Fn(&str) -> Option<Vec<f32>>,
    {
        let mut unique: Vec<JobRecord> = Vec::with_capacity(jobs.len());
        let mut embeddings: Vec<Option<Vec<f32>>> = Vec::with_capacity(jobs.len());

        for job in jobs {
            let text = format!(
                "{} {} {}",
                job.title,
                job.company.as_deref().unwrap_or(""),
                job.location.as_deref().unwrap_or("")
            );
            let Some(embedding) = embed(&text) else {
                // Embedding unavailable for this record: fail open, keep it.
                unique.push(job);
                embeddings.push(None);
                continue;
            };

            let duplicate_of = embeddings.iter().position(|prev| {
                prev.as_ref()
                    .is_some_and(|p| cosine_similarity(&embedding, p) >= SIMILARITY_THRESHOLD)
            });

            match duplicate_of {
                Some(i) => {
                    debug!("Semantic duplicate: '{}' ~ '{}'", job.title, unique[i].title);
                    merge_missing(&mut unique[i], &job);
                }
                None => {
                    unique.push(job);
                    embeddings.push(Some(embedding));
                }
            }
        }

        unique
    }
}

/// Pass 1: group by the exact identity key, first record seen per key is
/// canonical, later duplicates only fill its gaps.
pub fn dedup_exact(jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut seen: HashMap<String, JobRecord> = HashMap::new();

    for job in jobs {
        let key = identity_key(&job);
        match seen.get_mut(&key) {
            Some(existing) => merge_missing(existing, &job),
            None => {
                order.push(key.clone());
                seen.insert(key, job);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| seen.remove(&key))
        .collect()
}

/// Approximate identity: lowercased, whitespace-trimmed
/// (title, company, location) hashed to a fixed-width digest. Two
/// listings with slightly different titles for the same role are NOT
/// merged by this key.
pub fn identity_key(job: &JobRecord) -> String {
    let raw = format!(
        "{}|{}|{}",
        job.title.trim().to_lowercase(),
        job.company.as_deref().unwrap_or("").trim().to_lowercase(),
        job.location.as_deref().unwrap_or("").trim().to_lowercase()
    );
    let digest = Sha256::digest(raw.as_bytes());
    format!("{:x}", digest)
}

/// Back-fill gaps in `canonical` from `incoming`. Populated fields are
/// never overwritten.
fn merge_missing(canonical: &mut JobRecord, incoming: &JobRecord) {
    if canonical.salary.is_none() {
        canonical.salary = incoming.salary;
    }
    if canonical.easy_apply.is_none() {
        canonical.easy_apply = incoming.easy_apply;
    }
    if canonical.description.as_deref().is_none_or(str::is_empty) {
        canonical.description = incoming.description.clone();
    }
    if canonical.company.as_deref().is_none_or(str::is_empty) {
        canonical.company = incoming.company.clone();
    }
    if canonical.location.as_deref().is_none_or(str::is_empty) {
        canonical.location = incoming.location.clone();
    }
    if canonical.url.as_deref().is_none_or(str::is_empty) {
        canonical.url = incoming.url.clone();
    }
    if canonical.posted_date.is_none() {
        canonical.posted_date = incoming.posted_date;
    }
    if canonical.applicants.is_none() {
        canonical.applicants = incoming.applicants;
    }
}
