use std::path::PathBuf;
use thiserror::Error;

use crate::constants::exit_codes;

/// Represents all possible errors that can occur in Mason
#[derive(Error, Debug)]
pub enum Error {
    // Brick loading errors
    #[error("No '{metadata_file}' found in '{dir}'", metadata_file = crate::constants::BRICK_METADATA_FILENAME)]
    BrickMissingMetadata { dir: String },

    #[error("Malformed brick metadata in '{path}': {source}")]
    BrickMalformedMetadata {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Brick '{dir}' has no '{root}' template directory", root = crate::constants::TEMPLATE_ROOT_DIR)]
    BrickMissingTemplateRoot { dir: String },

    #[error("Invalid brick name '{name}': must match ^[a-z][a-z0-9_]*$")]
    InvalidBrickName { name: String },

    // Resolver errors
    #[error("Failed to fetch '{url}' at '{reference}': {stderr}")]
    GitFetchFailure { url: String, reference: String, stderr: String },

    #[error("Registry error: {0}")]
    Registry(#[source] anyhow::Error),

    #[error("Network access is disabled; cannot resolve remote brick")]
    NetworkDisabled,

    #[error("Failed to write cache entry '{path}': {source}")]
    CacheWriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Generation errors
    #[error("Missing values for required variables: {}", missing.join(", "))]
    VariableValidation { missing: Vec<String> },

    #[error("Invalid template at offset {offset}: {message}")]
    Render { template: String, offset: usize, message: String },

    #[error("Failed to write '{path}': {source}")]
    FileWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Generation was cancelled")]
    GenerateCancelled,

    // Hook errors
    #[error("Failed to install dependencies for hook '{hook_path}': {stderr}")]
    HookDependencyInstallFailure { hook_path: PathBuf, stderr: String },

    #[error("Hook '{hook_path}' contains invalid characters")]
    HookInvalidCharacters { hook_path: PathBuf },

    #[error("Hook '{hook_path}' does not define a 'run' entrypoint")]
    HookMissingRun { hook_path: PathBuf },

    #[error("Failed to start hook '{hook_path}': {source}")]
    HookRun {
        hook_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Hook '{hook_path}' failed: {message}")]
    HookExecution { hook_path: PathBuf, message: String },

    // Bundle errors
    #[error("Failed to decode bundle: {message}")]
    BundleDecode { message: String },

    // System errors
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("File system traversal failed: {0}")]
    Walkdir(#[from] walkdir::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Maps an error kind to its process exit code. Malformed inputs and
    /// missing bricks are usage errors; everything else is a software error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::BrickMissingMetadata { .. }
            | Error::BrickMalformedMetadata { .. }
            | Error::BrickMissingTemplateRoot { .. }
            | Error::InvalidBrickName { .. }
            | Error::VariableValidation { .. }
            | Error::Render { .. }
            | Error::BundleDecode { .. } => exit_codes::USAGE,
            _ => exit_codes::SOFTWARE,
        }
    }
}

/// Standard Result type for Mason operations
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Default error handler that prints the error message and exits with the
/// error's mapped exit code
pub fn default_error_handler(err: Error) -> ! {
    log::error!("{err}");
    std::process::exit(err.exit_code());
}
