//! Logger collaborator the core reports through.
//!
//! The core never inspects the logger's results; implementations are purely
//! side-effecting. The default implementation forwards to the `log` macros so
//! the CLI's `env_logger` wiring picks everything up.

/// A long-running operation reported through [`Logger::progress`].
pub trait Progress {
    /// Updates the progress label.
    fn update(&mut self, message: &str);
    /// Finishes the operation with a final message.
    fn done(&mut self, message: &str);
}

/// Side-effecting log sink injected into the generator core.
pub trait Logger {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn err(&self, message: &str);
    /// Low-priority detail lines (rendered paths, cache hits).
    fn detail(&self, message: &str);
    /// Starts a labelled long-running operation.
    fn progress(&self, label: &str) -> Box<dyn Progress>;
}

/// Logger backed by the `log` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdLogger;

impl Logger for StdLogger {
    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }

    fn err(&self, message: &str) {
        log::error!("{message}");
    }

    fn detail(&self, message: &str) {
        log::debug!("{message}");
    }

    fn progress(&self, label: &str) -> Box<dyn Progress> {
        log::info!("{label}...");
        Box::new(StdProgress { label: label.to_string() })
    }
}

struct StdProgress {
    label: String,
}

impl Progress for StdProgress {
    fn update(&mut self, message: &str) {
        log::info!("{}: {message}", self.label);
    }

    fn done(&mut self, message: &str) {
        log::info!("{}: {message}", self.label);
    }
}
