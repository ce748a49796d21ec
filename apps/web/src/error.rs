//! Errors raised while handling a request.

use axum::http::StatusCode;
use persistence::StoreError;
use sim_api::ApiError;
use sim_core::ValidationError;
use sim_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("the simulation server could not be reached: {0}")]
    Remote(#[from] ApiError),
    #[error("user database: {0}")]
    Store(#[from] StoreError),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("could not write the download: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode data: {0}")]
    Json(#[from] serde_json::Error),
}

impl WebError {
    /// Status of the generic error page.
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Validation(_)
            | WebError::Runtime(RuntimeError::Validation(_))
            | WebError::Runtime(RuntimeError::UnknownSimulation(_)) => StatusCode::BAD_REQUEST,
            WebError::Runtime(RuntimeError::NoCurrentSimulation)
            | WebError::Runtime(RuntimeError::SwitchUnsupported(_)) => StatusCode::CONFLICT,
            WebError::Remote(_)
            | WebError::Runtime(RuntimeError::Remote(_))
            | WebError::Runtime(RuntimeError::EmptySnapshot(_))
            | WebError::Runtime(RuntimeError::ForeignSnapshot { .. }) => StatusCode::BAD_GATEWAY,
            WebError::Store(_) | WebError::Hash(_) | WebError::Io(_) | WebError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_bad_requests() {
        let e: WebError = ValidationError::MalformedId("x".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        let e: WebError =
            RuntimeError::Validation(ValidationError::UnknownAction("fly".into())).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "unknown action: fly");
        let e: WebError = RuntimeError::Remote(ApiError::Timeout).into();
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn mixed_simulations_are_reported() {
        let e: WebError = RuntimeError::SwitchUnsupported(4).into();
        assert_eq!(e.status(), StatusCode::CONFLICT);
        assert_eq!(e.to_string(), "switching to simulation 4 is not ready yet");
        let e: WebError = RuntimeError::ForeignSnapshot {
            expected: 4,
            found: 5,
        }
        .into();
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
    }
}
