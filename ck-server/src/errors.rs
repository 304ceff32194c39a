use std::fmt::Display;

use axum::{
    http,
    response::{IntoResponse, Response},
};
use ck_gen::GenError;

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Internal Server Error: {0}")]
    InternalError(#[from] anyhow::Error),
    #[error("Recipe generation failed: {0}")]
    Generation(#[from] GenError),
    #[error("Not found")]
    NotFound,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        // In development, we want to return the error message
        // In production, we want to return a generic error message
        let display = |err: &dyn Display, fallback: &str| {
            if cfg!(debug_assertions) {
                err.to_string()
            } else {
                fallback.into()
            }
        };
        match self {
            WebError::InternalError(err) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                display(&err, "Internal Server Error"),
            )
                .into_response(),
            // No partial recipe is ever shown; the user retries by
            // resubmitting the query.
            WebError::Generation(err) => (
                http::StatusCode::BAD_GATEWAY,
                display(
                    &err,
                    "We couldn't generate a recipe right now. Please try again.",
                ),
            )
                .into_response(),
            WebError::NotFound => (http::StatusCode::NOT_FOUND, "Not Found").into_response(),
        }
    }
}
