//! Error taxonomy for the graph store and encoding pipeline.
//!
//! Contract violations and backend failures are surfaced to the caller as
//! [`RpgError`]; per-file and per-entity failures are collected as
//! [`Warning`]s instead of aborting the operation.

use thiserror::Error;

/// Errors surfaced to callers.
#[derive(Debug, Error)]
pub enum RpgError {
    #[error("storage backend failure: {0}")]
    Storage(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("dangling reference: edge endpoint {0} does not exist")]
    DanglingReference(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("no LLM provider configured")]
    LlmUnavailable,

    #[error("LLM call timed out after {0:?}")]
    LlmTimeout(std::time::Duration),

    #[error("LLM returned an invalid response: {0}")]
    LlmResponseInvalid(String),

    #[error("stale revision: expected {expected}, got {got}")]
    StaleRevision { expected: String, got: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub type RpgResult<T> = Result<T, RpgError>;

/// The kind of a non-fatal warning recorded during a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    DiscoveryUnreadableDir,
    ParseFailure,
    GroundingFailure,
    DependencyInjectionFailure,
    DataFlowDetectionFailure,
    LlmTimeout,
    LlmUnavailable,
    LlmResponseInvalid,
}

impl WarningKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DiscoveryUnreadableDir => "discovery_unreadable_dir",
            Self::ParseFailure => "parse_failure",
            Self::GroundingFailure => "grounding_failure",
            Self::DependencyInjectionFailure => "dependency_injection_failure",
            Self::DataFlowDetectionFailure => "data_flow_detection_failure",
            Self::LlmTimeout => "llm_timeout",
            Self::LlmUnavailable => "llm_unavailable",
            Self::LlmResponseInvalid => "llm_response_invalid",
        }
    }
}

/// A non-fatal, recorded failure. Pipelines always return a well-formed
/// result; degenerate runs surface their problems here rather than failing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    pub kind_label: String,
    pub message: String,
    pub context: Option<String>,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind_label: kind.as_str().to_string(),
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
