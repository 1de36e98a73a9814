//! Structured run logging.
//!
//! Every processing run logs its lifecycle with the run key and operation
//! attached, and can wrap its work in a span carrying the same fields.

use tracing::{error, info, warn, Span};
use vigil_models::RunKey;

/// Logger for one processing run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_key: String,
    operation: String,
}

impl RunLogger {
    pub fn new(run_key: &RunKey, operation: &str) -> Self {
        Self {
            run_key: run_key.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_key = %self.run_key, operation = %self.operation, "Run started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(run_key = %self.run_key, operation = %self.operation, "Run progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_key = %self.run_key, operation = %self.operation, "Run warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run_key = %self.run_key, operation = %self.operation, "Run error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_key = %self.run_key, operation = %self.operation, "Run completed: {}", message);
    }

    pub fn run_key(&self) -> &str {
        &self.run_key
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the run key and operation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_key = %self.run_key, operation = %self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_fields() {
        let key = RunKey::parse("D001_03").unwrap();
        let logger = RunLogger::new(&key, "process_video");
        assert_eq!(logger.run_key(), "D001_03");
        assert_eq!(logger.operation(), "process_video");
    }
}
