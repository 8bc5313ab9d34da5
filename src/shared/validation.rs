//! Validation Utilities

use validator::ValidationErrors;

use super::error::CodecError;

/// Field-level validation error
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Flatten top-level field errors.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect()
}

/// Convert validation errors to CodecError
pub fn validation_error(errors: ValidationErrors) -> CodecError {
    let message = field_errors(&errors)
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        // nested struct/list errors have no top-level field entry
        .unwrap_or_else(|| errors.to_string());

    CodecError::Validation(message)
}
