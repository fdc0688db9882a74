use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::{Validate, ValidationError};

pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9+\-.() ]{0,50}$").expect("phone pattern is valid"));

pub type ValidationResult<T> = Result<T, Custom<Json<ValidationResponse>>>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }

    pub fn field(status: Status, field: &str, message: &str) -> Custom<Json<ValidationResponse>> {
        Custom(status, Json(Self::with_error(field, message)))
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(_) => ("database", "Database error".to_string()),
            AppError::Authentication(msg) => {
                ("authentication", format!("Authentication error: {}", msg))
            }
            AppError::Authorization(msg) => {
                ("permission", format!("Permission denied: {}", msg))
            }
            AppError::NotFound(msg) => ("resource", format!("Not found: {}", msg)),
            AppError::Validation(msg) => ("request", msg.clone()),
            AppError::Duplicate { field, message } => (*field, message.clone()),
            AppError::Integrity(msg) => ("resource", msg.clone()),
            AppError::Internal(_) => ("server", "Internal server error".to_string()),
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self.code {
            403 => (
                "permission",
                "You don't have permission to perform this action",
            ),
            401 => ("authentication", "Authentication required"),
            404 => ("resource", "Resource not found"),
            409 => ("resource", "Resource is still referenced"),
            400 => ("request", "Bad request"),
            422 => ("validation", "Validation failed"),
            500 => ("server", "Internal server error"),
            503 => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

impl From<validator::ValidationErrors> for ValidationResponse {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let error_messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            error_map.insert(field.to_string(), error_messages);
        }

        ValidationResponse::new(error_map)
    }
}

/// Validates a JSON body and unwraps it, or produces a 422 listing every
/// failing field.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> ValidationResult<T>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> ValidationResult<T> {
        let inner = self.into_inner();
        match inner.validate() {
            Ok(()) => Ok(inner),
            Err(errors) => {
                tracing::warn!(errors = ?errors, "Request body failed validation");
                Err(Custom(
                    Status::UnprocessableEntity,
                    Json(ValidationResponse::from(errors)),
                ))
            }
        }
    }
}

/// A JSON body whose parse failure is handed to the handler, so that
/// permission checks run before the body is looked at.
pub type JsonBody<'r, T> = Result<Json<T>, json::Error<'r>>;

impl<T: Validate> JsonValidateExt<T> for JsonBody<'_, T> {
    fn validate_custom(self) -> ValidationResult<T> {
        match self {
            Ok(body) => body.validate_custom(),
            Err(json::Error::Io(err)) => {
                tracing::warn!(error = %err, "Failed to read request body");
                let status = if err.kind() == std::io::ErrorKind::UnexpectedEof {
                    Status::PayloadTooLarge
                } else {
                    Status::BadRequest
                };
                Err(ValidationResponse::field(
                    status,
                    "request",
                    "Could not read the request body",
                ))
            }
            // Well-formed JSON of the wrong shape is a 422, anything else a 400.
            Err(json::Error::Parse(_, err)) => {
                tracing::warn!(error = %err, "Malformed request body");
                let status = if err.is_data() {
                    Status::UnprocessableEntity
                } else {
                    Status::BadRequest
                };
                Err(ValidationResponse::field(status, "request", &err.to_string()))
            }
        }
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> ValidationResult<T>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> ValidationResult<T> {
        self.map_err(ToValidationResponse::to_validation_response)
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone")
            .with_message("Phone numbers may only contain digits, spaces and + - . ( )".into()))
    }
}

/// At most two decimal places, as stored.
pub fn validate_two_decimals(value: f64) -> Result<(), ValidationError> {
    let cents = value * 100.0;
    if (cents - cents.round()).abs() < 1e-6 {
        Ok(())
    } else {
        Err(ValidationError::new("decimal_places")
            .with_message("Ensure that there are no more than 2 decimal places".into()))
    }
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message("This field is required".into()))
    } else {
        Ok(())
    }
}
