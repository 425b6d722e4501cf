use temps_core::{ErrorClass, ServiceError, GENERIC_ERROR_MESSAGE};

#[test]
fn test_unauthorized_requests_login() {
    let error = ServiceError::Unauthorized {
        provider: "github".to_string(),
    };

    assert_eq!(error.classify(), ErrorClass::Unauthorized);
    assert!(error.requires_login());
    assert!(error.user_message().contains("github"));
}

#[test]
fn test_validation_is_shown_inline() {
    let error = ServiceError::Validation {
        field: "name".to_string(),
        message: "is required".to_string(),
    };

    assert_eq!(error.classify(), ErrorClass::Validation);
    assert!(!error.requires_login());
    assert_eq!(error.user_message(), "name: is required");
}

#[test]
fn test_other_errors_get_generic_message() {
    let errors = vec![
        ServiceError::ExternalService {
            service: "gitlab".to_string(),
            message: "502 Bad Gateway".to_string(),
        },
        ServiceError::Configuration {
            message: "bad url".to_string(),
        },
        ServiceError::Internal(anyhow::anyhow!("boom")),
    ];

    for error in errors {
        assert_eq!(error.classify(), ErrorClass::Unexpected);
        assert_eq!(error.user_message(), GENERIC_ERROR_MESSAGE);
    }
}
