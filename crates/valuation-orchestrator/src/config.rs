use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Process-wide configuration snapshot, loaded once at startup.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub llm_api_key: String,
    pub llm_model_name: String,
    pub llm_base_url: String,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub extraction_cache_ttl: Duration,
    pub valuation_cache_ttl: Duration,
    pub analysis_cache_ttl: Duration,
    pub equity_risk_premium_default: f64,
    pub tax_rate: f64,
    pub extraction_timeout: Duration,
    pub analysis_timeout: Duration,
}

fn env_secs(name: &str, default: u64) -> Result<Duration> {
    let secs: u64 = env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be an integer number of seconds", name))?;
    Ok(Duration::from_secs(secs))
}

fn env_f64(name: &str, default: f64) -> Result<f64> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a decimal", name))
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            llm_api_key: env::var("LLM_API_KEY").context("LLM_API_KEY not set")?,
            llm_model_name: env::var("LLM_MODEL_NAME")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8010".to_string()),
            data_dir: PathBuf::from(env::var("DATA_DIR").context("DATA_DIR not set")?),
            cache_dir: PathBuf::from(env::var("CACHE_DIR").context("CACHE_DIR not set")?),
            extraction_cache_ttl: env_secs("EXTRACTION_CACHE_TTL", 604_800)?,
            valuation_cache_ttl: env_secs("VALUATION_CACHE_TTL", 86_400)?,
            analysis_cache_ttl: env_secs("ANALYSIS_CACHE_TTL", 604_800)?,
            equity_risk_premium_default: env_f64("EQUITY_RISK_PREMIUM_DEFAULT", 0.05)?,
            tax_rate: env_f64("TAX_RATE", 0.21)?,
            extraction_timeout: env_secs("EXTRACTION_TIMEOUT_SECS", 60)?,
            analysis_timeout: env_secs("ANALYSIS_TIMEOUT_SECS", 120)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm_api_key.is_empty() {
            bail!("LLM_API_KEY is empty");
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            bail!("TAX_RATE must be in [0, 1), got {}", self.tax_rate);
        }
        if !(0.0..1.0).contains(&self.equity_risk_premium_default) {
            bail!(
                "EQUITY_RISK_PREMIUM_DEFAULT must be in [0, 1), got {}",
                self.equity_risk_premium_default
            );
        }
        if self.extraction_timeout.is_zero() || self.analysis_timeout.is_zero() {
            bail!("model timeouts must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CoreConfig {
        CoreConfig {
            llm_api_key: "key".to_string(),
            llm_model_name: "test-model".to_string(),
            llm_base_url: "http://localhost:8010".to_string(),
            data_dir: PathBuf::from("/tmp/data"),
            cache_dir: PathBuf::from("/tmp/cache"),
            extraction_cache_ttl: Duration::from_secs(604_800),
            valuation_cache_ttl: Duration::from_secs(86_400),
            analysis_cache_ttl: Duration::from_secs(604_800),
            equity_risk_premium_default: 0.05,
            tax_rate: 0.21,
            extraction_timeout: Duration::from_secs(60),
            analysis_timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn rejects_empty_api_key() {
        let mut config = test_config();
        config.llm_api_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_tax_rate() {
        let mut config = test_config();
        config.tax_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
