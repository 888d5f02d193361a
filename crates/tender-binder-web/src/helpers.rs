//! Helper types and traits for cleaner route handlers.
//!
//! Provides extension traits for converting `Option`, `Result`, and core
//! pipeline errors into HTTP-appropriate error responses, reducing
//! boilerplate in routes.

use axum::http::StatusCode;
use tender_binder_core::Error;

/// Standard result type for route handlers.
pub type RouteResult<T> = Result<T, (StatusCode, String)>;

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;

    /// Converts the error to 400 Bad Request.
    fn or_bad_request(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }

    fn or_bad_request(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// Extension trait mapping core pipeline errors to the status they deserve.
pub trait CoreResultExt<T> {
    /// Unsupported uploads become 400, missing images/sections 404,
    /// everything else 500.
    fn or_status(self) -> RouteResult<T>;
}

impl<T> CoreResultExt<T> for tender_binder_core::Result<T> {
    fn or_status(self) -> RouteResult<T> {
        self.map_err(|e| {
            let status = match &e {
                Error::UnsupportedImage(_) => StatusCode::BAD_REQUEST,
                Error::ImageNotFound(_) | Error::SectionNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })
    }
}
