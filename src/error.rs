//! Error types and exit codes for patchscope

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for patchscope operations
#[derive(Error, Debug)]
pub enum PatchScopeError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported language for extension: {extension}")]
    UnsupportedLanguage { extension: String },

    #[error("Failed to parse file: {message}")]
    ParseFailure { message: String },

    #[error("Failed to parse diff: {message}")]
    DiffParse { message: String },

    #[error("Found no identifier for node of kind `{kind}`")]
    NoIdentifierFound { kind: String },

    #[error("Line number must be a positive integer, got {line}")]
    InvalidLineNumber { line: i64 },

    #[error("Failed to apply patch: {message}")]
    PatchApplyFailure { message: String },

    #[error("Git error: {message}")]
    GitError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PatchScopeError {
    /// Convert error to appropriate exit code:
    /// - 0: Success
    /// - 1: File not found / IO error
    /// - 2: Unsupported language
    /// - 3: Parse failure (source or diff)
    /// - 4: Entity resolution failure
    /// - 5: Git / patch application error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound { .. } => ExitCode::from(1),
            Self::UnsupportedLanguage { .. } => ExitCode::from(2),
            Self::ParseFailure { .. } => ExitCode::from(3),
            Self::DiffParse { .. } => ExitCode::from(3),
            Self::NoIdentifierFound { .. } => ExitCode::from(4),
            Self::InvalidLineNumber { .. } => ExitCode::from(4),
            Self::PatchApplyFailure { .. } => ExitCode::from(5),
            Self::GitError { .. } => ExitCode::from(5),
            Self::Io(_) => ExitCode::from(1),
        }
    }
}

/// Result type alias for patchscope operations
pub type Result<T> = std::result::Result<T, PatchScopeError>;
