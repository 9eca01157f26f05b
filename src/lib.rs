/// Handles argument parsing and command dispatch.
pub mod cli;

/// Defines custom error types.
pub mod error;

/// Constants used throughout Mason.
pub mod constants;

/// Configuration passed into the generator core.
pub mod config;

/// Logger and progress collaborator traits.
pub mod logging;

/// Subprocess execution on behalf of git and hook dependency installs.
pub mod process;

/// The brick data model and `brick.yaml` schema.
pub mod brick;

/// Logic-less template rendering with case-transform lambdas.
pub mod renderer;

/// Loads bricks from directories and bundles.
pub mod loader;

/// Universal and source bundle codec.
pub mod bundle;

/// Resolves brick references into the content-addressed cache.
pub mod resolver;

/// Walks a brick's template tree and emits files.
pub mod generator;

/// Pre and post generation hook execution.
pub mod hooks;
