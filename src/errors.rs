use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to read input: {0}")]
    InputRead(#[source] std::io::Error),

    #[error("Failed to write output sink: {0}")]
    SinkWrite(#[source] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Output path is not writable: {0}")]
    OutputPath(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Failure modes of the external structured-extraction collaborator.
///
/// All of these are recoverable: the pipeline falls back to the heuristic
/// path exactly once and never retries the external call.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Extraction timed out after {0} ms")]
    Timeout(u64),

    #[error("Extractor output failed schema validation: {0}")]
    Schema(String),

    #[error("Extractor transport failure: {0}")]
    Transport(String),
}
