use std::path::PathBuf;

/// API process settings
///
/// Sandbox policy is loaded separately through `SandboxPolicy::load_default`
/// (`SANDBOX_CONFIG` and `CRUCIBLE_*`).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub redis_url: String,
    /// Serve problems from this JSON file instead of Redis
    pub problems_file: Option<PathBuf>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            problems_file: lookup("PROBLEMS_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ApiConfig::from_lookup(|_| None);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.problems_file, None);
    }

    #[test]
    fn test_overrides() {
        let cfg = ApiConfig::from_lookup(|key| match key {
            "BIND_ADDR" => Some("127.0.0.1:8080".to_string()),
            "REDIS_URL" => Some("redis://cache:6379".to_string()),
            "PROBLEMS_FILE" => Some("config/problems.json".to_string()),
            _ => None,
        });
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.redis_url, "redis://cache:6379");
        assert_eq!(cfg.problems_file, Some(PathBuf::from("config/problems.json")));
    }
}
