//! Error types for the driver layer and the Index-II workflow

use thiserror::Error;

/// Failures reported by the browser driver
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Print to PDF failed: {0}")]
    PdfFailed(String),
}

/// Result alias for driver operations
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Workflow-level failures.
///
/// `TransientPortal` is retried inside the submit loop, `NavigationTimeout` is
/// retried only by the bootstrap layer, `ElementNotFound` is raised once every
/// locator in a chain has been tried, `ExtractionFailure` is confined to one row
/// and `Fatal` aborts the run with the last observed cause.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Transient portal error: {0}")]
    TransientPortal(String),

    #[error("Navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Workflow aborted: {0}")]
    Fatal(String),

    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Artifact storage failed: {0}")]
    Storage(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias for workflow operations
pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
