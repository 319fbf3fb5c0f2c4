use axum::http::StatusCode;
use thiserror::Error;

use crate::{
    domain::{lifecycle::TransitionError, policy::FieldError, wizard::WizardError},
    reporting::ReportError,
    validation::rules::UploadRejection,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("validation error: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("{field} is out of range: {message}")]
    OutOfRange { field: String, message: String },
    #[error("upload rejected: {0}")]
    UploadRejected(#[from] UploadRejection),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Validation(_) | ServiceError::OutOfRange { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::UploadRejected(UploadRejection::TooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::UploadRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Validation(vec![FieldError::new(field, message)])
    }

    /// Field-level details for the JSON body; empty for other variants.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            ServiceError::Validation(fields) => fields.clone(),
            ServiceError::OutOfRange { field, message } => {
                vec![FieldError::new(field.clone(), message.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Message safe to show to the caller. Internal failures are logged, not
    /// echoed.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<FieldError> for ServiceError {
    fn from(err: FieldError) -> Self {
        ServiceError::Validation(vec![err])
    }
}

impl From<Vec<FieldError>> for ServiceError {
    fn from(errs: Vec<FieldError>) -> Self {
        ServiceError::Validation(errs)
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        ServiceError::Conflict(err.to_string())
    }
}

impl From<WizardError> for ServiceError {
    fn from(err: WizardError) -> Self {
        ServiceError::field("wizard", err.to_string())
    }
}

impl From<ReportError> for ServiceError {
    fn from(err: ReportError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errs
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    let message = error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid ({})", error.code));
                    FieldError::new(field, message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ServiceError::Validation(fields)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound,
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|err| format!("{}: {}", err.field, err.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lists_every_field() {
        let err = ServiceError::Validation(vec![
            FieldError::new("reason", "a rejection reason is required"),
            FieldError::new("year", "year must be between 2000 and 2100"),
        ]);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.to_string(),
            "validation error: reason: a rejection reason is required; year: year must be between 2000 and 2100"
        );
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn oversize_upload_maps_to_payload_too_large() {
        let err = ServiceError::from(UploadRejection::TooLarge { limit_mb: 30 });
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            err.public_message(),
            "upload rejected: file exceeds the maximum size of 30 MB"
        );
    }

    #[test]
    fn validator_errors_become_field_errors() {
        use validator::Validate;

        #[derive(Validate)]
        struct Payload {
            #[validate(length(min = 1, message = "description is required"))]
            description: String,
        }

        let err = ServiceError::from(
            Payload {
                description: String::new(),
            }
            .validate()
            .unwrap_err(),
        );
        assert_eq!(
            err.field_errors(),
            vec![FieldError::new("description", "description is required")]
        );
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = ServiceError::Internal("relation \"projects\" does not exist".into());
        assert_eq!(err.public_message(), "internal error");
    }
}
