use temps_core::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Submit handler failed: {0}")]
    Handler(#[from] ServiceError),
}

impl From<FormError> for ServiceError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::MissingField(field) => ServiceError::Validation {
                field,
                message: "is required".to_string(),
            },
            FormError::Handler(inner) => inner,
        }
    }
}
