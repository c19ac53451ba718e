//! Error types for HTML conversion

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a page
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to launch the browser or open a tab
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// The input document does not exist
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Failed to load the page
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to export the rendered page
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Page did not become ready in time
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid request or configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Writing the output file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
