use tela::error::{ErrorCategory, RecoverySuggestion, TelaError};

#[test]
fn categories_drive_retry_and_recovery() {
    let cases = [
        (TelaError::Authentication("bad key".into()), ErrorCategory::Authentication, false),
        (TelaError::RateLimited { retry_after_ms: Some(100) }, ErrorCategory::RateLimit, true),
        (TelaError::Timeout(30_000), ErrorCategory::Timeout, true),
        (TelaError::api(503, "unavailable"), ErrorCategory::Server, true),
        (TelaError::api(400, "bad body"), ErrorCategory::Api, false),
        (TelaError::api(404, "gone"), ErrorCategory::NotFound, false),
        (TelaError::Validation("empty".into()), ErrorCategory::Validation, false),
        (TelaError::DuplicateId("c1".into()), ErrorCategory::Validation, false),
        (TelaError::Format("not json".into()), ErrorCategory::Persistence, false),
        (TelaError::Configuration("no url".into()), ErrorCategory::Configuration, false),
    ];

    for (err, category, retryable) in cases {
        assert_eq!(err.category(), category, "{err}");
        assert_eq!(err.is_retryable(), retryable, "{err}");
    }
}

#[test]
fn recovery_suggestions() {
    assert_eq!(
        TelaError::Authentication("x".into()).recovery_suggestion(),
        RecoverySuggestion::CheckCredentials
    );
    assert_eq!(
        TelaError::Timeout(1).recovery_suggestion(),
        RecoverySuggestion::IncreaseTimeout
    );
    assert_eq!(
        TelaError::NotFound("c1".into()).recovery_suggestion(),
        RecoverySuggestion::CheckIdentifier
    );
    assert_eq!(
        TelaError::Io(std::io::Error::other("disk full")).recovery_suggestion(),
        RecoverySuggestion::CheckHistoryFile
    );
    assert_eq!(
        TelaError::Stream("reset".into()).recovery_suggestion(),
        RecoverySuggestion::ContactSupport
    );
}

#[test]
fn status_is_exposed_for_server_errors() {
    assert_eq!(TelaError::api(502, "bad gateway").status(), Some(502));
    assert_eq!(TelaError::RateLimited { retry_after_ms: None }.status(), Some(429));
    assert_eq!(TelaError::Validation("x".into()).status(), None);
}

#[test]
fn messages_are_readable() {
    assert_eq!(
        TelaError::api(500, "boom").to_string(),
        "API error (status 500): boom"
    );
    assert_eq!(
        TelaError::DuplicateId("support".into()).to_string(),
        "Conversation already exists: support"
    );
    assert_eq!(TelaError::Timeout(250).to_string(), "Timeout after 250ms");
}
