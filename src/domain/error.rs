use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("route pattern `{pattern}` must be anchored with `^` and `$`")]
    UnanchoredPattern { pattern: String },
    #[error("route pattern `{pattern}` is not a valid expression")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("route `{pattern}` names {declared} params but captures only {captures}")]
    ParamOverflow {
        pattern: String,
        declared: usize,
        captures: usize,
    },
    #[error("prerender path `{path}` has no `{placeholder}` placeholder for group {index}")]
    MissingPlaceholder {
        path: String,
        placeholder: String,
        index: usize,
    },
}

impl DomainError {
    pub fn unanchored(pattern: impl Into<String>) -> Self {
        Self::UnanchoredPattern {
            pattern: pattern.into(),
        }
    }
}
