use super::config::ConfigError;

/// Errors that escape a pipeline run
///
/// Remote-fetch, transform and duplicate-write failures are recovered inside
/// their components and never show up here.
#[derive(Debug)]
pub enum PipelineError {
    /// Missing or invalid setting while building a collaborator
    Config(ConfigError),
    Database(String),
    /// Blocking store task panicked or was cancelled
    Task(String),
}

impl PipelineError {
    pub fn is_config(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Config(err)
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Database(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Database(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Task(err.to_string())
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "Environment error: {}", e),
            PipelineError::Database(e) => write!(f, "Database error: {}", e),
            PipelineError::Task(e) => write!(f, "Task error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}
