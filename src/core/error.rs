//! Application-wide error types.

use thiserror::Error;

use crate::agent::AgentError;
use crate::llm::ProviderError;
use crate::parser::ParseError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("llm error: {0}")]
    Llm(#[from] ProviderError),

    #[error("analysis error: {0}")]
    Agent(#[from] AgentError),

    #[error("store error: {0}")]
    Store(String),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("config error"));
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn store_error_display() {
        let e = AppError::Store("chunks.db locked".into());
        assert!(e.to_string().contains("chunks.db locked"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }

    #[test]
    fn parse_error_converts() {
        let e: AppError = ParseError::UnsupportedFormat("xlsx".into()).into();
        assert!(e.to_string().contains("xlsx"));
    }

    #[test]
    fn provider_error_converts() {
        let e: AppError = ProviderError::UnknownProvider("gemini".into()).into();
        assert!(e.to_string().contains("llm error"));
        assert!(e.to_string().contains("gemini"));
    }
}
