//! Prompt for the structured relevance judgement

use crate::llm::client::ReasoningRequest;
use crate::processing::requirements::JobRequirement;

/// Longest excerpt of either document sent to the backend.
const MAX_DOCUMENT_CHARS: usize = 6000;

pub const JSON_ONLY_SYSTEM: &str = "You are a precise technical recruiter. \
    You MUST respond with a single valid JSON object only. \
    Do NOT use markdown code fences. \
    Do NOT include any text outside the JSON object.";

const RELEVANCE_TEMPLATE: &str = r#"Rate how well the resume fits the job on a 0-100 scale.

<JOB>
Role: {role}
Must-have skills: {must_have}
Good-to-have skills: {good_to_have}
Qualifications: {qualifications}
Minimum experience: {experience}

{job}
</JOB>

<RESUME>
{resume}
</RESUME>

Judge transferable experience and depth, not only keyword overlap.
Respond with exactly this JSON shape:
{"score": <number 0-100>, "rationale": "<at most four sentences; name concrete gaps and what the candidate should improve>"}"#;

/// Render the request for one resume/job pair.
pub fn build_relevance_request(
    resume_text: &str,
    requirement: &JobRequirement,
    job_text: &str,
) -> ReasoningRequest {
    let experience = requirement
        .min_experience_years
        .map(|years| format!("{years} years"))
        .unwrap_or_else(|| "not stated".to_string());

    let prompt = RELEVANCE_TEMPLATE
        .replace("{role}", &requirement.role_title)
        .replace("{must_have}", &join_or_none(&requirement.must_have))
        .replace("{good_to_have}", &join_or_none(&requirement.good_to_have))
        .replace("{qualifications}", &join_or_none(&requirement.qualifications))
        .replace("{experience}", &experience)
        .replace("{job}", &excerpt(job_text))
        .replace("{resume}", &excerpt(resume_text));

    ReasoningRequest {
        system: JSON_ONLY_SYSTEM.to_string(),
        prompt,
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(MAX_DOCUMENT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_contains_requirements_and_documents() {
        let requirement = JobRequirement::new("Data Engineer", &["Python", "SQL"], &["Airflow"])
            .with_min_experience(3.0);
        let request = build_relevance_request(
            "Jane Doe, Python developer",
            &requirement,
            "We need a data engineer",
        );

        assert_eq!(request.system, JSON_ONLY_SYSTEM);
        assert!(request.prompt.contains("Role: Data Engineer"));
        assert!(request.prompt.contains("Must-have skills: python, sql"));
        assert!(request.prompt.contains("Good-to-have skills: airflow"));
        assert!(request.prompt.contains("Qualifications: none"));
        assert!(request.prompt.contains("Minimum experience: 3 years"));
        assert!(request.prompt.contains("Jane Doe, Python developer"));
        assert!(request.prompt.contains(r#""score""#));
    }

    #[test]
    fn test_long_documents_are_excerpted() {
        let requirement = JobRequirement::new("Dev", &["rust"], &[]);
        let resume = "x".repeat(MAX_DOCUMENT_CHARS * 2);
        let request = build_relevance_request(&resume, &requirement, "job");
        assert!(request.prompt.len() < MAX_DOCUMENT_CHARS + RELEVANCE_TEMPLATE.len() + 100);
    }
}
