//! Scoring many resumes against one job

use crate::processing::aggregator::{MatchResult, Verdict};
use crate::processing::analyzer::{AnalysisEngine, JobContext};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const CANCELLED_BEFORE_DISPATCH: &str = "cancelled before dispatch";
const HISTOGRAM_BUCKETS: usize = 10;

/// Shared stop signal. Once set, no further resume is dispatched; analyses
/// already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeSource {
    Text(String),
    /// Extraction already failed upstream (unreadable file, bad PDF).
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeInput {
    pub id: String,
    pub source: ResumeSource,
}

impl ResumeInput {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: ResumeSource::Text(text.into()),
        }
    }

    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: ResumeSource::Failed(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryOutcome {
    Scored { result: Box<MatchResult> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub resume_id: String,
    /// `None` for failed entries.
    pub score: Option<f64>,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

impl BatchEntry {
    pub fn scored(resume_id: String, result: MatchResult) -> Self {
        Self {
            resume_id,
            score: Some(result.score),
            outcome: EntryOutcome::Scored {
                result: Box::new(result),
            },
        }
    }

    pub fn failed(resume_id: String, reason: impl Into<String>) -> Self {
        Self {
            resume_id,
            score: None,
            outcome: EntryOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn result(&self) -> Option<&MatchResult> {
        match &self.outcome {
            EntryOutcome::Scored { result } => Some(result.as_ref()),
            EntryOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.outcome {
            EntryOutcome::Failed { reason } => Some(reason),
            EntryOutcome::Scored { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCount {
    pub skill: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub verdicts: VerdictCounts,
    /// Ten buckets of width 10; a score of 100 lands in the last one.
    pub histogram: Vec<usize>,
    pub common_missing_skills: Vec<SkillCount>,
}

impl BatchStatistics {
    pub fn from_entries(entries: &[BatchEntry], top_missing_skills: usize) -> Self {
        let results: Vec<&MatchResult> = entries.iter().filter_map(BatchEntry::result).collect();
        let mut scores: Vec<f64> = results.iter().map(|r| r.score).collect();
        scores.sort_by(|a, b| a.total_cmp(b));

        let mean = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
        let median = match scores.len() {
            0 => None,
            n if n % 2 == 1 => Some(scores[n / 2]),
            n => Some((scores[n / 2 - 1] + scores[n / 2]) / 2.0),
        };

        let mut verdicts = VerdictCounts::default();
        let mut histogram = vec![0; HISTOGRAM_BUCKETS];
        let mut missing: HashMap<&str, usize> = HashMap::new();
        for result in &results {
            match result.verdict {
                Verdict::High => verdicts.high += 1,
                Verdict::Medium => verdicts.medium += 1,
                Verdict::Low => verdicts.low += 1,
            }
            let bucket = ((result.score / 10.0) as usize).min(HISTOGRAM_BUCKETS - 1);
            histogram[bucket] += 1;
            for skill in result.gaps() {
                *missing.entry(skill).or_insert(0) += 1;
            }
        }

        let mut common_missing_skills: Vec<SkillCount> = missing
            .into_iter()
            .map(|(skill, count)| SkillCount {
                skill: skill.to_string(),
                count,
            })
            .collect();
        common_missing_skills.sort_by(|a, b| b.count.cmp(&a.count).then(a.skill.cmp(&b.skill)));
        common_missing_skills.truncate(top_missing_skills);

        Self {
            total: entries.len(),
            scored: results.len(),
            failed: entries.len() - results.len(),
            mean,
            median,
            min: scores.first().copied(),
            max: scores.last().copied(),
            verdicts,
            histogram,
            common_missing_skills,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub role_title: String,
    /// Input order.
    pub entries: Vec<BatchEntry>,
    pub statistics: BatchStatistics,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Scored entries by descending score, then failures in input order.
    pub fn ranked(&self) -> Vec<&BatchEntry> {
        let mut scored: Vec<&BatchEntry> =
            self.entries.iter().filter(|e| e.score.is_some()).collect();
        scored.sort_by(|a, b| {
            b.score
                .unwrap_or_default()
                .total_cmp(&a.score.unwrap_or_default())
        });
        scored.extend(self.entries.iter().filter(|e| e.score.is_none()));
        scored
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

pub struct BatchRunner {
    engine: Arc<AnalysisEngine>,
    concurrency: usize,
    top_missing_skills: usize,
    cancellation: CancellationFlag,
    progress: Option<ProgressCallback>,
}

impl BatchRunner {
    pub fn new(engine: Arc<AnalysisEngine>) -> Self {
        let batch = &engine.config().batch;
        let concurrency = batch.concurrency.max(1);
        let top_missing_skills = batch.top_missing_skills;
        Self {
            engine,
            concurrency,
            top_missing_skills,
            cancellation: CancellationFlag::new(),
            progress: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    pub async fn run(&self, job: Arc<JobContext>, resumes: Vec<ResumeInput>) -> BatchReport {
        let started_at = Utc::now();
        let total = resumes.len();
        info!(
            "Scoring {} resumes against '{}' with {} workers",
            total,
            job.requirement().role_title,
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut slots: Vec<Option<BatchEntry>> = vec![None; total];
        let mut ids: Vec<String> = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        for (index, resume) in resumes.into_iter().enumerate() {
            ids.push(resume.id.clone());

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    slots[index] = Some(BatchEntry::failed(resume.id, "worker pool closed"));
                    continue;
                }
            };
            if self.cancellation.is_cancelled() {
                cancelled = true;
                drop(permit);
                slots[index] = Some(BatchEntry::failed(resume.id, CANCELLED_BEFORE_DISPATCH));
                continue;
            }

            let engine = Arc::clone(&self.engine);
            let job = Arc::clone(&job);
            let completed = Arc::clone(&completed);
            let progress = self.progress.clone();

            tasks.spawn(async move {
                let entry = analyze_one(&engine, &job, resume).await;
                drop(permit);

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = progress {
                    callback(BatchProgress {
                        completed: done,
                        total,
                    });
                }
                (index, entry)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(e) => warn!("Batch worker failed: {}", e),
            }
        }

        let entries: Vec<BatchEntry> = slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| BatchEntry::failed(id, "analysis task aborted"))
            })
            .collect();
        let statistics = BatchStatistics::from_entries(&entries, self.top_missing_skills);

        info!(
            "Batch finished: {} scored, {} failed{}",
            statistics.scored,
            statistics.failed,
            if cancelled { " (cancelled)" } else { "" }
        );

        BatchReport {
            role_title: job.requirement().role_title.clone(),
            entries,
            statistics,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

async fn analyze_one(engine: &AnalysisEngine, job: &JobContext, resume: ResumeInput) -> BatchEntry {
    let text = match resume.source {
        ResumeSource::Text(text) => text,
        ResumeSource::Failed(reason) => return BatchEntry::failed(resume.id, reason),
    };

    let document = match engine.parse_resume(&text) {
        Ok(document) => document.with_source(resume.id.clone()),
        Err(e) => {
            warn!("Skipping {}: {}", resume.id, e);
            return BatchEntry::failed(resume.id, e.to_string());
        }
    };

    match engine.analyze(&document, job).await {
        Ok(result) => BatchEntry::scored(resume.id, result),
        Err(e) => {
            warn!("Analysis failed for {}: {}", resume.id, e);
            BatchEntry::failed(resume.id, e.to_string())
        }
    }
}
