//! Error taxonomy for the classification pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single outbound request before any HTTP status was received.
#[derive(Debug, Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Every way a pipeline stage can fail.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("bad response status {status}, answer {body:?}")]
    BadResponseStatus { status: u16, body: String },
    #[error("matching service answered with code {code}: {message}")]
    BadResponseBody { code: i64, message: String },
    #[error("cannot decode response: {0}")]
    Decode(String),
    #[error("response {value:?} contains csv separator {separator:?}")]
    SeparatorCollision { value: String, separator: String },
    #[error("empty response")]
    EmptyResponse,
    #[error("query {text:?} has unknown category")]
    UnknownCategory { text: String },
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
    #[error("pipeline aborted")]
    Aborted,
    #[error("{}", join_errors(.0))]
    Multiple(Vec<PipelineError>),
}

fn join_errors(errors: &[PipelineError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error only reports that someone else stopped the pipeline.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Fold stage results into one outcome: root causes in arrival order win over aborts.
    /// A single root cause is returned as-is; several become [`PipelineError::Multiple`].
    pub fn collect(errors: impl IntoIterator<Item = PipelineError>) -> Option<PipelineError> {
        let mut aborted = false;
        let mut causes = Vec::new();
        for err in errors {
            match err {
                Self::Aborted => aborted = true,
                Self::Multiple(inner) => causes.extend(inner),
                other => causes.push(other),
            }
        }
        match causes.len() {
            0 if aborted => Some(Self::Aborted),
            0 => None,
            1 => causes.pop(),
            _ => Some(Self::Multiple(causes)),
        }
    }

    /// First root cause (or the error itself). Useful for matching on aggregated results.
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Multiple(inner) => inner.first().map_or(self, PipelineError::root),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_prefers_root_causes_over_aborts() {
        let err = PipelineError::collect([
            PipelineError::Aborted,
            PipelineError::EmptyResponse,
            PipelineError::Aborted,
        ]);
        assert!(matches!(err, Some(PipelineError::EmptyResponse)));
    }

    #[test]
    fn collect_reports_abort_only_without_causes() {
        let err = PipelineError::collect([PipelineError::Aborted, PipelineError::Aborted]);
        assert!(matches!(err, Some(PipelineError::Aborted)));
        assert!(PipelineError::collect(Vec::new()).is_none());
    }

    #[test]
    fn collect_aggregates_siblings_in_order() {
        let err = PipelineError::collect([
            PipelineError::BadResponseStatus {
                status: 500,
                body: "boom".into(),
            },
            PipelineError::Multiple(vec![PipelineError::EmptyResponse]),
        ])
        .unwrap();
        let PipelineError::Multiple(inner) = &err else {
            panic!("expected aggregate, got {err:?}");
        };
        assert_eq!(inner.len(), 2);
        assert!(matches!(
            err.root(),
            PipelineError::BadResponseStatus { status: 500, .. }
        ));
        assert!(err.to_string().contains("empty response"));
    }
}
