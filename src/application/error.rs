//! Error types shared by the HTTP surfaces and the binary entry point.

use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{reload::ReloadError, render::RenderError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic attached to an error response as an extension.
///
/// The response-logging middleware removes it and logs the message chain;
/// it never reaches the client.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    /// Outermost error first, followed by each `source()` in turn.
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut next = error.source();
        while let Some(inner) = next {
            messages.push(inner.to_string());
            next = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// A short public message for the client plus the full report for the logs.
#[derive(Debug)]
pub struct HttpError {
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            public_message,
            report: ErrorReport::from_message(source, status, detail),
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        Self {
            public_message,
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.report.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.report.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RenderError> for HttpError {
    fn from(error: RenderError) -> Self {
        HttpError::from_error(
            "application::render",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Page could not be rendered",
            &error,
        )
    }
}

impl From<ReloadError> for HttpError {
    fn from(error: ReloadError) -> Self {
        HttpError::from_error(
            "application::reload",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Reload failed",
            &error,
        )
    }
}

/// Failures that end the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid site definition: {0}")]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("reload aborted: {0}")]
    Reload(#[from] ReloadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// `EX_CONFIG` (78) for an invalid site or configuration, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Domain(_) | AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Infra(_) | AppError::Reload(_) | AppError::Unexpected(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn report_collects_the_source_chain() {
        let report = ErrorReport::from_error("test", StatusCode::BAD_GATEWAY, &Outer(Inner));
        assert_eq!(report.messages, vec!["outer", "inner"]);
        assert_eq!(report.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn render_errors_become_internal_server_errors() {
        let error = HttpError::from(RenderError::UnknownPage {
            page: "page.html".to_string(),
        });
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = error.into_response();
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.source, "application::render");
        assert!(report.messages[0].contains("page.html"));
    }

    #[test]
    fn configuration_failures_use_a_distinct_exit_code() {
        assert_eq!(
            AppError::from(InfraError::configuration("bad port")).exit_code(),
            78
        );
        assert_eq!(AppError::from(InfraError::database("down")).exit_code(), 1);
    }
}
