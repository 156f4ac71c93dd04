//! End-to-end tests for the scoring pipeline with in-process backends

use async_trait::async_trait;
use resume_relevance::config::Config;
use resume_relevance::input::InputManager;
use resume_relevance::llm::analyzer::ReasoningStatus;
use resume_relevance::llm::client::{ReasoningBackend, ReasoningRequest};
use resume_relevance::processing::aggregator::SemanticStatus;
use resume_relevance::processing::batch::{BatchProgress, CANCELLED_BEFORE_DISPATCH};
use resume_relevance::processing::embeddings::HashingEmbedder;
use resume_relevance::processing::signals::SignalKind;
use resume_relevance::{
    AnalysisEngine, BatchRunner, CancellationFlag, JobContext, RelevanceError, ResumeInput, Result, Verdict,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const DATA_ENGINEER_JOB: &str = "Data Engineer\n\nRequirements:\n- Python\n- SQL\n- AWS\n";

/// Replies with a fixed body and records how many calls overlap.
struct CountingReasoner {
    reply: String,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingReasoner {
    fn new(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningBackend for CountingReasoner {
    async fn reason(&self, _request: &ReasoningRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn model_id(&self) -> &str {
        "counting"
    }
}

fn lexical_engine() -> AnalysisEngine {
    AnalysisEngine::new(Config::default()).unwrap()
}

#[tokio::test]
async fn test_lexical_scenario_scores_two_of_three() {
    let engine = lexical_engine();
    let result = engine
        .analyze_text("Skills\nPython, SQL, Docker", DATA_ENGINEER_JOB)
        .await
        .unwrap();

    assert!((result.score - 66.67).abs() < 0.01);
    assert_eq!(result.verdict, Verdict::Medium);
    assert_eq!(result.missing_must_have, vec!["aws"]);
    assert_eq!(result.matched_skills, vec!["python", "sql"]);
    assert!(result.recommendations.iter().any(|r| r.contains("aws")));
    assert!(!result.recommendations.iter().any(|r| r.to_lowercase().contains("python")));
}

#[tokio::test(start_paused = true)]
async fn test_batch_caps_concurrent_reasoning_calls() {
    let reasoner = CountingReasoner::new(
        r#"{"score": 80, "rationale": "Relevant data platform work."}"#,
        Duration::from_millis(50),
    );
    let engine = Arc::new(lexical_engine().with_reasoning(reasoner.clone()));
    let job = Arc::new(engine.prepare_job(DATA_ENGINEER_JOB).unwrap());

    let resumes: Vec<ResumeInput> = (0..50)
        .map(|i| ResumeInput::text(format!("resume-{i}"), format!("Candidate {i}\nSkills: Python, SQL, AWS")))
        .collect();

    let report = BatchRunner::new(Arc::clone(&engine))
        .with_concurrency(50)
        .run(job, resumes)
        .await;

    assert_eq!(reasoner.calls(), 50);
    assert!(reasoner.peak() <= 10, "peak in-flight was {}", reasoner.peak());
    assert!(reasoner.peak() > 1);

    assert_eq!(report.entries.len(), 50);
    for (i, entry) in report.entries.iter().enumerate() {
        assert_eq!(entry.resume_id, format!("resume-{i}"));
        let result = entry.result().unwrap();
        assert_eq!(result.reasoning_status, ReasoningStatus::Fresh);
    }
    assert_eq!(report.statistics.scored, 50);
    assert_eq!(engine.reasoning().unwrap().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_reasoning_is_excluded_and_weights_renormalize() {
    let reasoner = CountingReasoner::new("This candidate looks like a great fit!", Duration::ZERO);
    let engine = lexical_engine()
        .with_semantic(Arc::new(HashingEmbedder::new(256)))
        .with_reasoning(reasoner.clone());

    let result = engine
        .analyze_text("Skills: Python, SQL, AWS. Built data pipelines.", DATA_ENGINEER_JOB)
        .await
        .unwrap();

    assert_eq!(reasoner.calls(), 3);
    assert_eq!(result.reasoning_status, ReasoningStatus::Excluded);
    assert!(result.signal(SignalKind::Reasoning).is_none());
    assert_eq!(result.weight(SignalKind::Hard), Some(0.5));
    assert_eq!(result.weight(SignalKind::Semantic), Some(0.5));
    assert_eq!(result.weight(SignalKind::Reasoning), None);
    assert_eq!(result.semantic_status, SemanticStatus::Scored);

    let hard = result.signal(SignalKind::Hard).unwrap().score();
    let semantic = result.signal(SignalKind::Semantic).unwrap().score();
    assert!((result.score - (hard + semantic) / 2.0).abs() < 1e-9);
    assert!((result.confidence - (1.0 - (hard - semantic).abs() / 100.0)).abs() < 1e-9);
}

#[tokio::test]
async fn test_warm_cache_gives_identical_results() {
    let reasoner = CountingReasoner::new(
        r#"{"score": 72, "rationale": "Good SQL depth; should show more cloud work."}"#,
        Duration::ZERO,
    );
    let engine = lexical_engine()
        .with_semantic(Arc::new(HashingEmbedder::new(128)))
        .with_reasoning(reasoner.clone());
    let job = engine.prepare_job(DATA_ENGINEER_JOB).unwrap();
    let resume = engine.parse_resume("Jane Doe\nSkills: Python, SQL").unwrap();

    let first = engine.analyze(&resume, &job).await.unwrap();
    let second = engine.analyze(&resume, &job).await.unwrap();

    assert_eq!(reasoner.calls(), 1);
    assert_eq!(first.reasoning_status, ReasoningStatus::Fresh);
    assert_eq!(second.reasoning_status, ReasoningStatus::Cached);
    assert_eq!(first.score, second.score);
    assert_eq!(first.missing_must_have, second.missing_must_have);
    assert_eq!(first.recommendations, second.recommendations);

    let semantic_cache = engine.semantic().unwrap().cache_stats();
    assert!(semantic_cache.hits >= 1);
}

#[tokio::test]
async fn test_failures_become_entries_without_stopping_the_batch() {
    let engine = Arc::new(lexical_engine());
    let job = Arc::new(engine.prepare_job(DATA_ENGINEER_JOB).unwrap());
    let resumes = vec![
        ResumeInput::text("strong", "Skills: Python, SQL, AWS"),
        ResumeInput::text("empty", "   "),
        ResumeInput::failed("scan.pdf", "Failed to extract text from PDF"),
        ResumeInput::text("weak", "Skills: Excel"),
    ];

    let report = BatchRunner::new(engine).run(job, resumes).await;

    let ids: Vec<&str> = report.entries.iter().map(|e| e.resume_id.as_str()).collect();
    assert_eq!(ids, vec!["strong", "empty", "scan.pdf", "weak"]);
    assert!(report.entries[1].failure().is_some());
    assert_eq!(report.entries[2].failure(), Some("Failed to extract text from PDF"));
    assert_eq!(report.statistics.scored, 2);
    assert_eq!(report.statistics.failed, 2);

    let ranked: Vec<&str> = report.ranked().iter().map(|e| e.resume_id.as_str()).collect();
    assert_eq!(ranked, vec!["strong", "weak", "empty", "scan.pdf"]);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch() {
    let engine = Arc::new(lexical_engine());
    let job = Arc::new(engine.prepare_job(DATA_ENGINEER_JOB).unwrap());
    let flag = CancellationFlag::new();
    let trigger = flag.clone();

    let runner = BatchRunner::new(engine)
        .with_concurrency(1)
        .with_cancellation(flag)
        .with_progress(Arc::new(move |_progress: BatchProgress| trigger.cancel()));

    let resumes = (0..4)
        .map(|i| ResumeInput::text(format!("r{i}"), "Skills: Python, SQL"))
        .collect();
    let report = runner.run(job, resumes).await;

    assert!(report.cancelled);
    assert_eq!(report.entries.len(), 4);
    assert!(report.entries[0].result().is_some());
    for entry in &report.entries[1..] {
        assert_eq!(entry.failure(), Some(CANCELLED_BEFORE_DISPATCH));
    }
}

#[tokio::test]
async fn test_structured_job_and_files_on_disk() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("jane.md"),
        "# Jane Doe\n\n## Skills\n\n- Kubernetes\n- Golang\n- Terraform\n\n## Experience\n\nPlatform Engineer, 2018 - 2024\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.docx"), "ignored").unwrap();

    let parsed = serde_json::json!({
        "role_title": "Platform Engineer",
        "must_have_skills": ["Kubernetes", "Go"],
        "good_to_have_skills": ["Rust"],
        "experience_years": 5
    });
    let requirement = serde_json::from_value::<resume_relevance::processing::requirements::ParsedJobDescription>(parsed)
        .unwrap()
        .into();
    let job = JobContext::from_requirement(requirement);

    let mut manager = InputManager::new();
    let files = manager.collect_files(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(files.len(), 1);

    let resume = manager.load_resume(&files[0], 10).await.unwrap();
    assert_eq!(resume.candidate_name(), Some("Jane Doe"));

    let result = lexical_engine().analyze(&resume, &job).await.unwrap();
    assert!(result.missing_must_have.is_empty());
    assert_eq!(result.missing_good_to_have, vec!["rust"]);
    assert_eq!(result.role_title, "Platform Engineer");
}

#[tokio::test]
async fn test_job_text_too_short_is_rejected() {
    let err = lexical_engine().prepare_job("Engineer").unwrap_err();
    assert!(matches!(err, RelevanceError::Extraction(_)));
}
