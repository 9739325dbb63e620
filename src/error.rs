//!
//! # Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! The HTTP status a failure maps to is part of the public contract, so every variant
//! pins one down: invalid input and malformed identifiers are 400, failed authentication
//! is 401, a missing or foreign-owned record is 404, and anything unexpected is 500.
//!
//! `AppError` implements `actix_web::error::ResponseError` so handlers can return it
//! directly. `From` implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error` and the rest let call sites lean on the `?` operator.

use actix_web::{error::ResponseError, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
///
/// Client-facing variants carry a message that is serialized as `{"error": "..."}`.
/// `NotFound` and `Internal` respond with an empty body; internal details are
/// logged server-side and never shown to the caller.
#[derive(Debug)]
pub enum AppError {
    /// Input failed validation rules (HTTP 400).
    Validation(String),
    /// The request itself is malformed: bad identifier, disallowed update
    /// field, rejected upload and similar (HTTP 400).
    BadRequest(String),
    /// Authentication is missing, expired or revoked (HTTP 401).
    Unauthorized(String),
    /// The record does not exist, or belongs to someone else (HTTP 404).
    /// Both cases answer identically so ownership cannot be probed.
    NotFound,
    /// An unexpected server-side failure (HTTP 500). The message stays in
    /// the server log.
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound => write!(f, "Not Found"),
            AppError::Internal(msg) => write!(f, "Internal Server Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// This lets Actix Web translate `AppError` results from handlers into the
/// correct HTTP status codes and bodies.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            AppError::BadRequest(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            AppError::Unauthorized(msg) => HttpResponse::Unauthorized().json(json!({
                "error": msg
            })),
            AppError::NotFound => HttpResponse::NotFound().finish(),
            AppError::Internal(msg) => {
                log::error!("internal error: {}", msg);
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound`, a unique-constraint violation surfaces as
/// a validation failure (duplicate email on registration is the common case),
/// and everything else is an internal error.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                match db.constraint() {
                    Some(constraint) if constraint.contains("email") => {
                        AppError::Validation("Email already in use".into())
                    }
                    Some(constraint) => {
                        AppError::Validation(format!("Duplicate value for {}", constraint))
                    }
                    None => AppError::Validation("Duplicate value".into()),
                }
            }
            _ => AppError::Internal(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::Validation`.
///
/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::Validation(error.to_string())
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::Unauthorized`.
///
/// Used when token verification fails.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::Internal`.
///
/// This handles errors during password hashing or verification.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Internal(error.to_string())
    }
}

/// Converts multipart payload errors into `AppError::BadRequest`.
///
/// A broken or truncated upload is the client's fault.
impl From<actix_multipart::MultipartError> for AppError {
    fn from(error: actix_multipart::MultipartError) -> AppError {
        AppError::BadRequest(error.to_string())
    }
}

/// Converts `image::ImageError` into `AppError::BadRequest`.
///
/// Bytes that cannot be decoded as an image fail the upload, not the server.
impl From<image::ImageError> for AppError {
    fn from(error: image::ImageError) -> AppError {
        AppError::BadRequest(format!("Invalid image: {}", error))
    }
}

/// Converts `std::io::Error` into `AppError::Internal`.
///
/// Filesystem trouble while storing an already accepted upload is ours, not
/// the client's.
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> AppError {
        AppError::Internal(error.to_string())
    }
}
