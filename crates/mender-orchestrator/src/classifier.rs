//! Failure classification.
//!
//! Turns an arbitrary error raised by an AI backend into an [`AiError`] by
//! matching well-known phrases in its message, so callers that only hold a
//! foreign error type can still pick a sensible fallback.

use mender_abstraction::{AiError, ErrorCategory, ErrorSeverity};
use std::error::Error;

/// Keyword table checked in order; the first category with a matching phrase wins.
///
/// Numeric status codes only match as whole tokens.
const CATEGORY_KEYWORDS: &[(ErrorCategory, &[&str])] = &[
    (ErrorCategory::Timeout, &["timeout", "timed out", "deadline exceeded"]),
    (
        ErrorCategory::ResourceExhaustion,
        &[
            "out of memory",
            "cuda error",
            "insufficient memory",
            "resource exhausted",
            "no space left",
            "disk full",
        ],
    ),
    (
        ErrorCategory::ModelLoading,
        &["failed to load", "model not found", "load model", "missing weights", "checkpoint"],
    ),
    (
        ErrorCategory::Network,
        &[
            "connection",
            "network",
            "unreachable",
            "dns",
            "reset by peer",
            "service unavailable",
            "502",
            "503",
            "504",
        ],
    ),
    (
        ErrorCategory::Configuration,
        &["config", "api key", "credential", "unauthorized", "forbidden", "401", "403"],
    ),
    (
        ErrorCategory::Validation,
        &["invalid", "validation", "unsupported", "malformed", "must be", "400"],
    ),
    (
        ErrorCategory::Inference,
        &["inference", "generation failed", "sampling", "diffusion"],
    ),
];

/// Classifies foreign errors into the AI error taxonomy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Creates a new error classifier.
    pub fn new() -> Self {
        Self
    }

    /// Category implied by an error message.
    pub fn classify_message(&self, message: &str) -> ErrorCategory {
        let lower = message.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| matches_keyword(&lower, keyword)))
            .map_or(ErrorCategory::Unknown, |(category, _)| *category)
    }

    /// Wraps `error` as an [`AiError`], keeping its message as the cause.
    pub fn classify(&self, error: &dyn Error) -> AiError {
        let category = self.classify_message(&error.to_string());
        AiError::new(error.to_string(), category)
            .with_severity(default_severity(category))
            .with_cause(error)
    }
}

fn matches_keyword(message: &str, keyword: &str) -> bool {
    if keyword.bytes().all(|b| b.is_ascii_digit()) {
        message.split(|c: char| !c.is_ascii_alphanumeric()).any(|token| token == keyword)
    } else {
        message.contains(keyword)
    }
}

/// Severity assumed when the raiser did not choose one.
pub fn default_severity(category: ErrorCategory) -> ErrorSeverity {
    match category {
        ErrorCategory::Validation => ErrorSeverity::Low,
        ErrorCategory::Inference
        | ErrorCategory::Timeout
        | ErrorCategory::Network
        | ErrorCategory::Unknown => ErrorSeverity::Medium,
        ErrorCategory::ModelLoading
        | ErrorCategory::ResourceExhaustion
        | ErrorCategory::Configuration => ErrorSeverity::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct TestError {
        msg: String,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.msg)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_classify_messages() {
        let classifier = ErrorClassifier::new();
        let cases = [
            ("Connection timeout after 30s", ErrorCategory::Timeout),
            ("CUDA error: out of memory", ErrorCategory::ResourceExhaustion),
            ("Failed to load pipeline weights", ErrorCategory::ModelLoading),
            ("Connection refused by backend", ErrorCategory::Network),
            ("HTTP 503 Service Unavailable", ErrorCategory::Network),
            ("Invalid API key supplied", ErrorCategory::Configuration),
            ("Prompt must be non-empty", ErrorCategory::Validation),
            ("NaN encountered during sampling", ErrorCategory::Inference),
            ("something odd happened", ErrorCategory::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(classifier.classify_message(message), expected, "{message}");
        }
    }

    #[test]
    fn test_status_codes_match_whole_tokens() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.classify_message("diffusion failed at step 1400"),
            ErrorCategory::Inference
        );
        assert_eq!(classifier.classify_message("upstream returned 5030 tokens"), ErrorCategory::Unknown);
        assert_eq!(classifier.classify_message("status 400: bad request"), ErrorCategory::Validation);
        assert_eq!(classifier.classify_message("HTTP/1.1 502"), ErrorCategory::Network);
        assert_eq!(classifier.classify_message("got 403 from gateway"), ErrorCategory::Configuration);
    }

    #[test]
    fn test_classify_error_keeps_cause() {
        let classifier = ErrorClassifier::new();
        let error = TestError { msg: "Network is unreachable".to_string() };
        let ai_error = classifier.classify(&error);

        assert_eq!(ai_error.category, ErrorCategory::Network);
        assert_eq!(ai_error.severity, ErrorSeverity::Medium);
        assert_eq!(ai_error.original_cause.as_deref(), Some("Network is unreachable"));
        assert!(ai_error.suggested_fallback.is_none());
    }

    #[test]
    fn test_default_severity() {
        assert_eq!(default_severity(ErrorCategory::Validation), ErrorSeverity::Low);
        assert_eq!(default_severity(ErrorCategory::ResourceExhaustion), ErrorSeverity::High);
        assert_eq!(default_severity(ErrorCategory::Unknown), ErrorSeverity::Medium);
    }
}
