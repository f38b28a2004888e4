use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "/app/data";
pub const DEFAULT_INTERPRETER: &str = "python3 -I";

/// Harness settings, read from the container environment
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Shared directory holding the input payload and receiving the output payload
    pub data_dir: PathBuf,
    /// Interpreter command line, split on whitespace
    pub interpreter: Vec<String>,
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("HARNESS_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

        let interpreter: Vec<String> = lookup("HARNESS_INTERPRETER")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let interpreter = if interpreter.is_empty() {
            DEFAULT_INTERPRETER.split_whitespace().map(str::to_string).collect()
        } else {
            interpreter
        };

        Self {
            data_dir: PathBuf::from(data_dir),
            interpreter,
        }
    }

    pub fn input_path(&self) -> PathBuf {
        self.data_dir.join("input.json")
    }

    pub fn output_path(&self) -> PathBuf {
        self.data_dir.join("output.json")
    }
}
