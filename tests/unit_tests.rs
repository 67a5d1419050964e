// Unit tests for CV Match

use cv_match::core::{
    assessment::{parse_assessment, strip_code_fence},
    extract::{DocumentFormat, ExtractError, TextExtractor},
    identity::content_key,
};
use cv_match::models::{CriteriaScores, MatchResult};

const PAYLOAD: &str = r#"{
    "match": true,
    "overall_score": 85,
    "criteria_scores": {"skills": 90, "experience": 80, "location": 70, "education": 70, "certifications": 60},
    "explanation": "Strong match"
}"#;

#[test]
fn test_identity_equal_inputs_equal_keys() {
    let pairs = [
        ("", ""),
        ("5 years Python, AWS", "Looking for Python engineer, AWS required"),
        ("Zürich, Schweiz", "Standort: Zürich"),
    ];

    for (cv, job) in pairs {
        assert_eq!(content_key(cv, job), content_key(cv, job));
    }
}

#[test]
fn test_identity_order_matters() {
    let cv = "5 years Python, AWS";
    let job = "Looking for Python engineer, AWS required";

    assert_ne!(content_key(cv, job), content_key(job, cv));
}

#[test]
fn test_identity_format() {
    let key = content_key("cv", "job");

    assert_eq!(key.as_str().len(), 64);
    assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_fence_variants_parse_identically() {
    let expected = parse_assessment(PAYLOAD).unwrap();

    let variants = [
        format!("```json\n{}\n```", PAYLOAD),
        format!("```\n{}\n```", PAYLOAD),
        format!("  ```JSON\n{}\n```  \n", PAYLOAD),
        format!("```json\n{}", PAYLOAD),
        format!("{}\n```", PAYLOAD),
    ];

    for variant in &variants {
        assert_eq!(parse_assessment(variant).unwrap(), expected, "variant: {:?}", variant);
    }
}

#[test]
fn test_strip_leaves_inner_backticks() {
    let raw = "```json\n{\"explanation\": \"uses `cargo`\"}\n```";
    assert_eq!(strip_code_fence(raw), "{\"explanation\": \"uses `cargo`\"}");
}

#[test]
fn test_parsed_result_matches_scenario() {
    let result = parse_assessment(PAYLOAD).unwrap();

    assert_eq!(
        result,
        MatchResult::scored(
            true,
            85,
            CriteriaScores {
                skills: 90,
                experience: 80,
                location: 70,
                education: 70,
                certifications: 60,
            },
            "Strong match",
        )
    );
}

#[test]
fn test_score_bound_enforcement() {
    let too_high = PAYLOAD.replace("\"education\": 70", "\"education\": 150");
    let not_bool = PAYLOAD.replace("\"match\": true", "\"match\": 1");
    let overall_too_high = PAYLOAD.replace("\"overall_score\": 85", "\"overall_score\": 101");

    assert!(parse_assessment(&too_high).is_err());
    assert!(parse_assessment(&not_bool).is_err());
    assert!(parse_assessment(&overall_too_high).is_err());
}

#[test]
fn test_boundary_scores_accepted() {
    let zero = PAYLOAD
        .replace("\"overall_score\": 85", "\"overall_score\": 0")
        .replace("\"skills\": 90", "\"skills\": 100");

    let result = parse_assessment(&zero).unwrap();
    assert_eq!(result.overall_score, 0);
    assert_eq!(result.criteria_scores.skills, 100);
}

#[test]
fn test_extraction_dispatch() {
    let extractor = TextExtractor::default();

    assert_eq!(
        extractor.extract_text(b"# Job\nRust engineer", "job.md").unwrap(),
        "# Job\nRust engineer"
    );
    assert!(matches!(
        extractor.extract_text(b"data", "application/zip"),
        Err(ExtractError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        extractor.extract_text(b"PK", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        Err(ExtractError::Failed { format: DocumentFormat::Docx, .. })
    ));
    assert!(matches!(
        TextExtractor::empty().extract_text(b"PK", "cv.docx"),
        Err(ExtractError::ExtractorUnavailable(DocumentFormat::Docx))
    ));
}
