use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Style compilation failed for {}: {message}", path.display())]
    Style { path: PathBuf, message: String },

    #[error("Script compilation failed for {}: {message}", path.display())]
    Script { path: PathBuf, message: String },

    #[error("Cannot resolve module '{specifier}' imported from {}", importer.display())]
    Resolve { specifier: String, importer: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Watch error: {0}")]
    Watch(String),
}

impl PipelineError {
    pub fn style(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Style {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn script(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Script {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn resolve(specifier: &str, importer: impl Into<PathBuf>) -> Self {
        Self::Resolve {
            specifier: specifier.to_string(),
            importer: importer.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Join a batch of parser/transformer diagnostics into one script error.
    pub fn script_diagnostics<D: std::fmt::Display>(path: impl Into<PathBuf>, diagnostics: &[D]) -> Self {
        let message = diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self::script(path, message)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<regex::Error> for PipelineError {
    fn from(err: regex::Error) -> Self {
        PipelineError::config(format!("Regex error: {}", err))
    }
}

impl From<notify::Error> for PipelineError {
    fn from(err: notify::Error) -> Self {
        PipelineError::Watch(err.to_string())
    }
}

impl From<globset::Error> for PipelineError {
    fn from(err: globset::Error) -> Self {
        PipelineError::config(format!("Invalid glob: {}", err))
    }
}
