use std::time::Duration;

use crate::error::Result;
use crate::exec_ctx::{DEFAULT_IMAGE_MODEL, DEFAULT_LLM_MODEL};
use crate::retention::{DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL};
use crate::PipelineError;

/// Service configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the API
/// keys, which are empty (and therefore not sent) unless provided.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub image_base_url: String,
    pub image_api_key: String,
    pub image_model: String,
    /// How long a request stays in the ledger (default: 2 hours).
    pub retention: Duration,
    /// How often the ledger is swept (default: 2 hours).
    pub sweep_interval: Duration,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_api_key_set", &!self.llm_api_key.is_empty())
            .field("llm_model", &self.llm_model)
            .field("image_base_url", &self.image_base_url)
            .field("image_api_key_set", &!self.image_api_key.is_empty())
            .field("image_model", &self.image_model)
            .field("retention", &self.retention)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                      |
    /// |-----------------------|------------------------------|
    /// | `HOST`                | `0.0.0.0`                    |
    /// | `PORT`                | `3000`                       |
    /// | `LLM_BASE_URL`        | `https://api.openai.com`     |
    /// | `LLM_API_KEY`         | empty                        |
    /// | `LLM_MODEL`           | `gpt-4o-mini`                |
    /// | `IMAGE_BASE_URL`      | `https://api.minimax.io`     |
    /// | `IMAGE_API_KEY`       | empty                        |
    /// | `IMAGE_MODEL`         | `image-01`                   |
    /// | `RETENTION_SECS`      | `7200`                       |
    /// | `SWEEP_INTERVAL_SECS` | `7200`                       |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = parse_number::<u16>("PORT", &var("PORT", "3000"))?;
        let retention_secs = parse_number::<u64>(
            "RETENTION_SECS",
            &var("RETENTION_SECS", &DEFAULT_RETENTION.as_secs().to_string()),
        )?;
        let sweep_secs = parse_number::<u64>(
            "SWEEP_INTERVAL_SECS",
            &var("SWEEP_INTERVAL_SECS", &DEFAULT_SWEEP_INTERVAL.as_secs().to_string()),
        )?;
        if sweep_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "SWEEP_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port,
            llm_base_url: var("LLM_BASE_URL", "https://api.openai.com"),
            llm_api_key: var("LLM_API_KEY", ""),
            llm_model: var("LLM_MODEL", DEFAULT_LLM_MODEL),
            image_base_url: var("IMAGE_BASE_URL", "https://api.minimax.io"),
            image_api_key: var("IMAGE_API_KEY", ""),
            image_model: var("IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            retention: Duration::from_secs(retention_secs),
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    /// `host:port` for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        PipelineError::InvalidConfig(format!("{} must be a valid number, got '{}'", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ServiceConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert!(config.llm_api_key.is_empty());
        assert_eq!(config.retention, Duration::from_secs(7200));
        assert_eq!(config.sweep_interval, Duration::from_secs(7200));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("LLM_API_KEY", "sk-secret"),
            ("IMAGE_BASE_URL", "http://images.local"),
            ("RETENTION_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.llm_api_key, "sk-secret");
        assert_eq!(config.image_base_url, "http://images.local");
        assert_eq!(config.retention, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref m) if m.contains("PORT")));
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        assert!(load(&[("SWEEP_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let config = load(&[("LLM_API_KEY", "sk-secret")]).unwrap();
        let out = format!("{:?}", config);
        assert!(!out.contains("sk-secret"));
        assert!(out.contains("llm_api_key_set: true"));
    }
}
