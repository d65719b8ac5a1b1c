use crate::utils::{Logger, PipelineError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Read-only view of the environment the pipeline is configured from.
///
/// Values from a project-level `.env` file are layered under the process
/// environment, so an exported variable always wins over the file.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    variables: HashMap<String, String>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// `.env` in `root` (if present) overlaid with `std::env::vars()`.
    pub fn load(root: &Path) -> Result<Self> {
        let mut source = Self::new();

        let env_file = root.join(".env");
        if env_file.is_file() {
            source.load_env_file(&env_file)?;
        }

        source.variables.extend(std::env::vars());
        Ok(source)
    }

    fn load_env_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(PipelineError::Io)?;

        Logger::debug(&format!("Loading env file: {}", path.display()));

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = parse_env_line(line) {
                self.variables.insert(key, value);
            } else {
                Logger::warn(&format!(
                    "Invalid env line in {} at line {}: {}",
                    path.display(),
                    line_num + 1,
                    line
                ));
            }
        }

        Ok(())
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.variables.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse a port variable, falling back to `default` when unset.
    pub fn port_or(&self, key: &str, default: u16) -> Result<u16> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                PipelineError::config(format!("{} must be a port number, got '{}'", key, raw))
            }),
        }
    }
}

/// Parse a single `KEY=value` line.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;

    let key = key.trim();
    let value = value.trim();

    let first = key.chars().next()?;
    if !first.is_alphabetic() && first != '_' {
        return None;
    }

    if !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    let value = if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    };

    Some((key.to_string(), value.to_string()))
}
